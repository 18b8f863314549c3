use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;

/// Atomic masses used when weighting fragments, keyed by element symbol.
///
/// Elements missing from the table fall back to [`DEFAULT_MASS`].
static ELEMENT_MASSES: Map<&'static str, f64> = phf_map! {
    "H" => 1.01,
    "D" => 2.0,
    "C" => 12.01,
    "N" => 14.01,
    "O" => 16.00,
    "F" => 19.00,
    "P" => 30.97,
};

pub const DEFAULT_MASS: f64 = 10.0;

/// Chemical elements found in ligands and unnatural residues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Element {
    H,
    D,
    B,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    Si,
    P,
    S,
    Cl,
    K,
    Ca,
    Fe,
    Zn,
    Se,
    Br,
    I,
    #[default]
    Unknown,
}

impl Element {
    pub fn from_atomic_number(number: u32) -> Self {
        match number {
            1 => Self::H,
            5 => Self::B,
            6 => Self::C,
            7 => Self::N,
            8 => Self::O,
            9 => Self::F,
            11 => Self::Na,
            12 => Self::Mg,
            14 => Self::Si,
            15 => Self::P,
            16 => Self::S,
            17 => Self::Cl,
            19 => Self::K,
            20 => Self::Ca,
            26 => Self::Fe,
            30 => Self::Zn,
            34 => Self::Se,
            35 => Self::Br,
            53 => Self::I,
            _ => Self::Unknown,
        }
    }

    /// Guesses the element from a PDB-style atom name (`" C12"`, `"CL1 "`, `"HO2"`).
    ///
    /// Two-letter halogens are recognized only when the name is left-aligned, following the
    /// PDB column convention.
    pub fn from_atom_name(name: &str) -> Self {
        let left_aligned = !name.starts_with(' ') && name.len() >= 4;
        let letters: String = name
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if left_aligned && letters.len() >= 2 {
            let element: Element = letters[..2].parse().unwrap_or(Self::Unknown);
            if element != Self::Unknown {
                return element;
            }
        }
        letters
            .get(..1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Unknown)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::H => "H",
            Self::D => "D",
            Self::B => "B",
            Self::C => "C",
            Self::N => "N",
            Self::O => "O",
            Self::F => "F",
            Self::Na => "Na",
            Self::Mg => "Mg",
            Self::Si => "Si",
            Self::P => "P",
            Self::S => "S",
            Self::Cl => "Cl",
            Self::K => "K",
            Self::Ca => "Ca",
            Self::Fe => "Fe",
            Self::Zn => "Zn",
            Self::Se => "Se",
            Self::Br => "Br",
            Self::I => "I",
            Self::Unknown => "X",
        }
    }

    pub fn mass(&self) -> f64 {
        ELEMENT_MASSES
            .get(self.symbol())
            .copied()
            .unwrap_or(DEFAULT_MASS)
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Self::H | Self::D)
    }
}

impl FromStr for Element {
    type Err = std::convert::Infallible;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        Ok(match symbol.trim().to_uppercase().as_str() {
            "H" | "1H" => Self::H,
            "D" | "2H" => Self::D,
            "B" => Self::B,
            "C" => Self::C,
            "N" => Self::N,
            "O" => Self::O,
            "F" => Self::F,
            "NA" => Self::Na,
            "MG" => Self::Mg,
            "SI" => Self::Si,
            "P" => Self::P,
            "S" => Self::S,
            "CL" => Self::Cl,
            "K" => Self::K,
            "CA" => Self::Ca,
            "FE" => Self::Fe,
            "ZN" => Self::Zn,
            "SE" => Self::Se,
            "BR" => Self::Br,
            "I" => Self::I,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single atom of the molecule.
///
/// Atoms are created once by a structure parser and never change afterwards; geometry is kept
/// in [`super::conformer::ConformerSet`] rather than on the atom itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub index: usize,
    pub element: Element,
    /// Atom name as it appears in the structure file, column padding included.
    pub name: String,
    pub residue_name: String,
}

impl Atom {
    pub fn new(index: usize, element: Element, name: &str, residue_name: &str) -> Self {
        Self {
            index,
            element,
            name: name.to_string(),
            residue_name: residue_name.to_string(),
        }
    }

    pub fn mass(&self) -> f64 {
        self.element.mass()
    }

    /// The 4-column label used by templates and library files, with spaces written as `_`.
    ///
    /// Names shorter than four columns are aligned the PDB way: one leading pad column, the
    /// rest padded on the right (`"C1"` becomes `"_C1_"`).
    pub fn template_name(&self) -> String {
        let padded = if self.name.len() >= 4 {
            self.name.clone()
        } else if self.name.starts_with(' ') {
            format!("{:<4}", self.name)
        } else {
            format!(" {:<3}", self.name)
        };
        padded.replace(' ', "_")
    }

    /// Name without column padding, used for lookups such as `"CA"`.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_table_matches_known_elements() {
        assert_eq!(Element::H.mass(), 1.01);
        assert_eq!(Element::D.mass(), 2.0);
        assert_eq!(Element::C.mass(), 12.01);
        assert_eq!(Element::N.mass(), 14.01);
        assert_eq!(Element::O.mass(), 16.00);
        assert_eq!(Element::F.mass(), 19.00);
        assert_eq!(Element::P.mass(), 30.97);
    }

    #[test]
    fn elements_outside_mass_table_use_default_mass() {
        assert_eq!(Element::S.mass(), DEFAULT_MASS);
        assert_eq!(Element::Cl.mass(), DEFAULT_MASS);
        assert_eq!(Element::Unknown.mass(), DEFAULT_MASS);
    }

    #[test]
    fn element_from_atomic_number_covers_organic_set() {
        assert_eq!(Element::from_atomic_number(6), Element::C);
        assert_eq!(Element::from_atomic_number(8), Element::O);
        assert_eq!(Element::from_atomic_number(17), Element::Cl);
        assert_eq!(Element::from_atomic_number(118), Element::Unknown);
    }

    #[test]
    fn element_from_atom_name_respects_pdb_alignment() {
        assert_eq!(Element::from_atom_name(" C12"), Element::C);
        assert_eq!(Element::from_atom_name("CL1 "), Element::Cl);
        assert_eq!(Element::from_atom_name(" CA "), Element::C);
        assert_eq!(Element::from_atom_name("HO2"), Element::H);
        assert_eq!(Element::from_atom_name("1HB"), Element::Unknown);
    }

    #[test]
    fn template_name_pads_and_replaces_spaces() {
        let padded = Atom::new(0, Element::C, " C1 ", "LIG");
        assert_eq!(padded.template_name(), "_C1_");

        let bare = Atom::new(1, Element::C, "C1", "LIG");
        assert_eq!(bare.template_name(), "_C1_");

        let full = Atom::new(2, Element::H, "H12A", "LIG");
        assert_eq!(full.template_name(), "H12A");
    }

    #[test]
    fn trimmed_name_strips_column_padding() {
        let atom = Atom::new(0, Element::C, " CA ", "UNK");
        assert_eq!(atom.trimmed_name(), "CA");
    }
}
