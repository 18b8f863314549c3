use crate::core::io::traits::InputFile;
use crate::core::models::molecule::MoleculeGraph;
use crate::core::models::topology::{Bond, BondList};
use serde::Deserialize;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorsionListError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV format error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {row}: atom {atom} is out of range for a molecule of {atom_count} atoms")]
    AtomOutOfRange {
        row: usize,
        atom: usize,
        atom_count: usize,
    },
    #[error("Row {row}: atoms {a} and {b} are not bonded")]
    NotBonded { row: usize, a: usize, b: usize },
}

#[derive(Debug, Deserialize)]
struct TorsionRecord {
    atom_i: usize,
    atom_j: usize,
}

/// Rotatable bonds reported by an external discovery step, in file order.
///
/// The CSV carries a header row `atom_i,atom_j` with 0-based atom indices.
pub struct TorsionListFile;

impl InputFile for TorsionListFile {
    type Output = BondList;
    type Error = TorsionListError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut bonds = BondList::new();
        for record in csv_reader.deserialize() {
            let record: TorsionRecord = record?;
            bonds.push(Bond::new(record.atom_i, record.atom_j));
        }
        Ok(bonds)
    }
}

/// Checks that every listed torsion is an existing bond of `molecule`.
///
/// # Errors
///
/// Returns the first row (1-based) whose atoms are out of range or not bonded.
pub fn validate_against(bonds: &BondList, molecule: &MoleculeGraph) -> Result<(), TorsionListError> {
    let atom_count = molecule.atom_count();
    for (i, bond) in bonds.iter().enumerate() {
        let row = i + 1;
        for atom in [bond.a, bond.b] {
            if atom >= atom_count {
                return Err(TorsionListError::AtomOutOfRange {
                    row,
                    atom,
                    atom_count,
                });
            }
        }
        if !molecule.has_bond(bond.a, bond.b) {
            return Err(TorsionListError::NotBonded {
                row,
                a: bond.a,
                b: bond.b,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use std::io::BufReader;

    fn read(text: &str) -> Result<BondList, TorsionListError> {
        TorsionListFile::read_from(&mut BufReader::new(text.as_bytes()))
    }

    fn butane() -> MoleculeGraph {
        let atoms = (0..4)
            .map(|i| Atom::new(i, Element::C, &format!("C{}", i + 1), "BUT"))
            .collect();
        MoleculeGraph::new(atoms, [(0, 1), (1, 2), (2, 3)].map(Bond::from)).unwrap()
    }

    #[test]
    fn reads_pairs_in_file_order_and_normalizes_them() {
        let bonds = read("atom_i,atom_j\n2, 1\n0,1\n").unwrap();
        assert_eq!(bonds.as_slice(), &[Bond::new(1, 2), Bond::new(0, 1)]);
    }

    #[test]
    fn skips_comment_lines_and_duplicates() {
        let bonds = read("atom_i,atom_j\n# from sampling log\n1,2\n2,1\n").unwrap();
        assert_eq!(bonds.len(), 1);
    }

    #[test]
    fn rejects_non_numeric_indices() {
        assert!(matches!(
            read("atom_i,atom_j\none,2\n"),
            Err(TorsionListError::Csv(_))
        ));
    }

    #[test]
    fn validation_accepts_existing_bonds() {
        let bonds: BondList = [Bond::new(1, 2)].into_iter().collect();
        assert!(validate_against(&bonds, &butane()).is_ok());
    }

    #[test]
    fn validation_rejects_unbonded_pair() {
        let bonds: BondList = [Bond::new(1, 2), Bond::new(0, 3)].into_iter().collect();
        assert!(matches!(
            validate_against(&bonds, &butane()),
            Err(TorsionListError::NotBonded { row: 2, a: 0, b: 3 })
        ));
    }

    #[test]
    fn validation_rejects_out_of_range_atom() {
        let bonds: BondList = [Bond::new(2, 9)].into_iter().collect();
        assert!(matches!(
            validate_against(&bonds, &butane()),
            Err(TorsionListError::AtomOutOfRange { atom: 9, .. })
        ));
    }
}
