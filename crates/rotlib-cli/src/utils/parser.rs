use rotlib::engine::config::{AtomPair, AtomSelector};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid atom pair '{0}'. Expected 'A:B' with atom indices or names (e.g., 'C1:C2').")]
    InvalidAtomPair(String),

    #[error("Atom '{atom}' cannot be empty in pair '{pair}'.")]
    EmptyAtom { atom: &'static str, pair: String },
}

/// Parses `A:B` (or `A,B`) into a pair of atom selectors.
pub fn parse_atom_pair(s: &str) -> Result<AtomPair, ParseError> {
    let (a, b) = s
        .split_once([':', ','])
        .ok_or_else(|| ParseError::InvalidAtomPair(s.to_string()))?;
    let selector = |text: &str, atom: &'static str| -> Result<AtomSelector, ParseError> {
        text.parse().map_err(|_| ParseError::EmptyAtom {
            atom,
            pair: s.to_string(),
        })
    };
    Ok((selector(a, "first")?, selector(b, "second")?))
}
