use crate::core::models::molecule::MoleculeGraph;
use crate::core::rotamers::assignment::free_library_label;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("The {name} resolution must be a positive number of degrees, got {value}")]
    InvalidResolution { name: &'static str, value: f64 },
    #[error("No free grid library exists for a {0} degree resolution")]
    UnsupportedGridResolution(f64),
    #[error("The torsion ceiling must allow at least one torsion per group")]
    ZeroTorsionLimit,
    #[error("An R-group root cannot be combined with {0}")]
    RGroupRootConflict(&'static str),
    #[error("Invalid {kind} '{value}'")]
    InvalidValue { kind: &'static str, value: String },
}

/// How bonds inside rings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingMode {
    /// Ring bonds stay rigid.
    #[default]
    Off,
    /// Ring bonds are sampled together with the free torsions.
    On,
    /// Only ring bonds are sampled.
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryMode {
    /// Free grid libraries per torsion, plus ring libraries from conformers.
    #[default]
    Combinatorial,
    /// One library per group, quantized from sampled conformers.
    Conformer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidueMode {
    #[default]
    Ligand,
    /// Amino acid with an N-CA-C backbone that is rooted at N.
    UnnaturalAminoAcid,
}

macro_rules! keyword_enum {
    ($ty:ty, $kind:literal, { $($variant:path => $text:literal),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    _ => Err(ConfigError::InvalidValue {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($variant => $text,)+
                })
            }
        }
    };
}

keyword_enum!(RingMode, "ring mode", {
    RingMode::Off => "off",
    RingMode::On => "on",
    RingMode::Only => "only",
});

keyword_enum!(LibraryMode, "library mode", {
    LibraryMode::Combinatorial => "combinatorial",
    LibraryMode::Conformer => "conformer",
});

keyword_enum!(ResidueMode, "residue mode", {
    ResidueMode::Ligand => "ligand",
    ResidueMode::UnnaturalAminoAcid => "unnatural-amino-acid",
});

/// An atom picked by 0-based index or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomSelector {
    Index(usize),
    Name(String),
}

impl AtomSelector {
    pub fn resolve(&self, molecule: &MoleculeGraph) -> Option<usize> {
        match self {
            AtomSelector::Index(index) => (*index < molecule.atom_count()).then_some(*index),
            AtomSelector::Name(name) => molecule.find_atom(name),
        }
    }
}

impl FromStr for AtomSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                kind: "atom",
                value: s.to_string(),
            });
        }
        Ok(match trimmed.parse::<usize>() {
            Ok(index) => AtomSelector::Index(index),
            Err(_) => AtomSelector::Name(trimmed.to_string()),
        })
    }
}

impl fmt::Display for AtomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomSelector::Index(index) => write!(f, "{}", index),
            AtomSelector::Name(name) => f.write_str(name),
        }
    }
}

pub type AtomPair = (AtomSelector, AtomSelector);

/// Settings for one library build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Grid step in degrees for free torsions and for conformer quantization.
    pub grid_resolution: f64,
    /// Grid step for hydroxyl-like torsions; falls back to `grid_resolution`.
    pub hydroxyl_resolution: Option<f64>,
    pub ring_mode: RingMode,
    /// Forced tree root; chosen automatically when absent.
    pub root: Option<AtomSelector>,
    /// Attachment atom of the R-group to sample; the root becomes the atom farthest from it
    /// and earlier template atoms stay on the main chain.
    pub r_group_root: Option<AtomSelector>,
    /// Largest number of torsions any one group may hold.
    pub max_torsions: Option<usize>,
    /// Replaces the rotatable bond list read from disk.
    pub torsions: Option<Vec<AtomPair>>,
    /// Bonds removed from the rotatable set.
    pub fixed_bonds: Vec<AtomPair>,
    /// Bonds sampled by the backbone library instead of a side library.
    pub backbone_torsions: Vec<AtomPair>,
    /// Split non-core atoms into independent branch groups.
    pub multiple_libraries: bool,
    pub residue_mode: ResidueMode,
    pub library_mode: LibraryMode,
    /// Overrides the residue name taken from the structure.
    pub residue_name: Option<String>,
}

impl BuildConfig {
    pub fn hydroxyl_grid(&self) -> f64 {
        self.hydroxyl_resolution.unwrap_or(self.grid_resolution)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 10.0,
            hydroxyl_resolution: None,
            ring_mode: RingMode::Off,
            root: None,
            r_group_root: None,
            max_torsions: None,
            torsions: None,
            fixed_bonds: Vec::new(),
            backbone_torsions: Vec::new(),
            multiple_libraries: true,
            residue_mode: ResidueMode::Ligand,
            library_mode: LibraryMode::Combinatorial,
            residue_name: None,
        }
    }
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    grid_resolution: Option<f64>,
    hydroxyl_resolution: Option<f64>,
    ring_mode: Option<RingMode>,
    root: Option<AtomSelector>,
    r_group_root: Option<AtomSelector>,
    max_torsions: Option<usize>,
    torsions: Option<Vec<AtomPair>>,
    fixed_bonds: Vec<AtomPair>,
    backbone_torsions: Vec<AtomPair>,
    multiple_libraries: Option<bool>,
    residue_mode: Option<ResidueMode>,
    library_mode: Option<LibraryMode>,
    residue_name: Option<String>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid_resolution(mut self, degrees: f64) -> Self {
        self.grid_resolution = Some(degrees);
        self
    }
    pub fn hydroxyl_resolution(mut self, degrees: Option<f64>) -> Self {
        self.hydroxyl_resolution = degrees;
        self
    }
    pub fn ring_mode(mut self, mode: RingMode) -> Self {
        self.ring_mode = Some(mode);
        self
    }
    pub fn root(mut self, root: Option<AtomSelector>) -> Self {
        self.root = root;
        self
    }
    pub fn r_group_root(mut self, atom: Option<AtomSelector>) -> Self {
        self.r_group_root = atom;
        self
    }
    pub fn max_torsions(mut self, limit: Option<usize>) -> Self {
        self.max_torsions = limit;
        self
    }
    pub fn torsions(mut self, torsions: Option<Vec<AtomPair>>) -> Self {
        self.torsions = torsions;
        self
    }
    pub fn fixed_bonds(mut self, bonds: Vec<AtomPair>) -> Self {
        self.fixed_bonds = bonds;
        self
    }
    pub fn backbone_torsions(mut self, bonds: Vec<AtomPair>) -> Self {
        self.backbone_torsions = bonds;
        self
    }
    pub fn multiple_libraries(mut self, enabled: bool) -> Self {
        self.multiple_libraries = Some(enabled);
        self
    }
    pub fn residue_mode(mut self, mode: ResidueMode) -> Self {
        self.residue_mode = Some(mode);
        self
    }
    pub fn library_mode(mut self, mode: LibraryMode) -> Self {
        self.library_mode = Some(mode);
        self
    }
    pub fn residue_name(mut self, name: Option<String>) -> Self {
        self.residue_name = name;
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        let defaults = BuildConfig::default();
        let config = BuildConfig {
            grid_resolution: self.grid_resolution.unwrap_or(defaults.grid_resolution),
            hydroxyl_resolution: self.hydroxyl_resolution,
            ring_mode: self.ring_mode.unwrap_or(defaults.ring_mode),
            root: self.root,
            r_group_root: self.r_group_root,
            max_torsions: self.max_torsions,
            torsions: self.torsions,
            fixed_bonds: self.fixed_bonds,
            backbone_torsions: self.backbone_torsions,
            multiple_libraries: self.multiple_libraries.unwrap_or(defaults.multiple_libraries),
            residue_mode: self.residue_mode.unwrap_or(defaults.residue_mode),
            library_mode: self.library_mode.unwrap_or(defaults.library_mode),
            residue_name: self
                .residue_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        };

        check_resolution("grid", config.grid_resolution)?;
        if let Some(hydroxyl) = config.hydroxyl_resolution {
            check_resolution("hydroxyl", hydroxyl)?;
        }
        if config.r_group_root.is_some() {
            if config.root.is_some() {
                return Err(ConfigError::RGroupRootConflict("an explicit root"));
            }
            if config.residue_mode == ResidueMode::UnnaturalAminoAcid {
                return Err(ConfigError::RGroupRootConflict("amino acid mode"));
            }
        }
        if config.max_torsions == Some(0) {
            return Err(ConfigError::ZeroTorsionLimit);
        }
        if config.library_mode == LibraryMode::Combinatorial {
            for resolution in [config.grid_resolution, config.hydroxyl_grid()] {
                if free_library_label(resolution).is_none() {
                    return Err(ConfigError::UnsupportedGridResolution(resolution));
                }
            }
        }
        Ok(config)
    }
}

fn check_resolution(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 360.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidResolution { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::topology::Bond;

    #[test]
    fn builder_applies_defaults() {
        let config = BuildConfigBuilder::new().build().unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.grid_resolution, 10.0);
        assert!(config.multiple_libraries);
        assert_eq!(config.hydroxyl_grid(), 10.0);
    }

    #[test]
    fn builder_rejects_non_positive_resolution() {
        let err = BuildConfigBuilder::new().grid_resolution(0.0).build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidResolution {
                name: "grid",
                value: 0.0
            }
        );
        let err = BuildConfigBuilder::new()
            .hydroxyl_resolution(Some(-5.0))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidResolution {
                name: "hydroxyl",
                ..
            }
        ));
    }

    #[test]
    fn combinatorial_mode_requires_a_free_library_grid() {
        let err = BuildConfigBuilder::new().grid_resolution(7.0).build().unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedGridResolution(7.0));

        let err = BuildConfigBuilder::new()
            .hydroxyl_resolution(Some(25.0))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedGridResolution(25.0));
    }

    #[test]
    fn conformer_mode_accepts_any_positive_grid() {
        let config = BuildConfigBuilder::new()
            .library_mode(LibraryMode::Conformer)
            .grid_resolution(7.0)
            .build()
            .unwrap();
        assert_eq!(config.grid_resolution, 7.0);
    }

    #[test]
    fn zero_torsion_ceiling_is_rejected() {
        let err = BuildConfigBuilder::new().max_torsions(Some(0)).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroTorsionLimit);
    }

    #[test]
    fn blank_residue_name_is_dropped() {
        let config = BuildConfigBuilder::new()
            .residue_name(Some("  ".to_string()))
            .build()
            .unwrap();
        assert_eq!(config.residue_name, None);
    }

    #[test]
    fn mode_keywords_parse_case_insensitively() {
        assert_eq!("ONLY".parse::<RingMode>().unwrap(), RingMode::Only);
        assert_eq!("conformer".parse::<LibraryMode>().unwrap(), LibraryMode::Conformer);
        assert_eq!(
            "unnatural-amino-acid".parse::<ResidueMode>().unwrap(),
            ResidueMode::UnnaturalAminoAcid
        );
        assert!(matches!(
            "sometimes".parse::<RingMode>(),
            Err(ConfigError::InvalidValue {
                kind: "ring mode",
                ..
            })
        ));
        assert_eq!(RingMode::On.to_string(), "on");
    }

    #[test]
    fn atom_selector_parses_indices_and_names() {
        assert_eq!("12".parse::<AtomSelector>().unwrap(), AtomSelector::Index(12));
        assert_eq!(
            " C1 ".parse::<AtomSelector>().unwrap(),
            AtomSelector::Name("C1".to_string())
        );
        assert!("".parse::<AtomSelector>().is_err());
    }

    #[test]
    fn atom_selector_resolves_against_molecule() {
        let atoms = vec![
            Atom::new(0, Element::C, " C1 ", "LIG"),
            Atom::new(1, Element::O, " O1 ", "LIG"),
        ];
        let molecule = MoleculeGraph::new(atoms, [Bond::new(0, 1)]).unwrap();
        assert_eq!(AtomSelector::Index(1).resolve(&molecule), Some(1));
        assert_eq!(AtomSelector::Index(2).resolve(&molecule), None);
        assert_eq!(AtomSelector::Name("O1".into()).resolve(&molecule), Some(1));
        assert_eq!(AtomSelector::Name("N9".into()).resolve(&molecule), None);
    }

    #[test]
    fn builder_rejects_r_group_root_with_other_roots() {
        let err = BuildConfigBuilder::new()
            .root(Some(AtomSelector::Index(0)))
            .r_group_root(Some(AtomSelector::Index(3)))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::RGroupRootConflict("an explicit root"));

        let err = BuildConfigBuilder::new()
            .residue_mode(ResidueMode::UnnaturalAminoAcid)
            .r_group_root(Some(AtomSelector::Index(3)))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::RGroupRootConflict("amino acid mode"));
    }
}
