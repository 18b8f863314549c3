use thiserror::Error;

use super::config::ConfigError;
use crate::core::geometry::zmatrix::ConversionError;
use crate::core::io::template::TemplateError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No atom qualifies as tree root: every core contains only torsion endpoints")]
    NoValidRoot,

    #[error("Atom {atom} cannot be the root: its rigid core contains only torsion endpoints")]
    InvalidRoot { atom: usize },

    #[error("Tree construction stalled: {unplaced} atom(s) of group {group} were never reached")]
    DisconnectedTree { group: isize, unplaced: usize },

    #[error(
        "Cannot keep groups within {limit} torsion(s): {remaining} torsion(s) remain in the largest group"
    )]
    CannotSatisfyTorsionLimit { limit: usize, remaining: usize },

    #[error("Atom {atom} is not connected to the root atom {root}")]
    UnreachableAtom { atom: usize, root: usize },

    #[error("Backbone atom '{0}' is missing from the residue")]
    MissingBackboneAtom(&'static str),

    #[error("Atom selection '{0}' does not match any atom")]
    AtomNotFound(String),

    #[error("Atoms {a} and {b} are not bonded, so they cannot form a torsion")]
    NotBonded { a: usize, b: usize },

    #[error("Building {0} requires sampled conformers, but none were supplied")]
    MissingConformers(&'static str),

    #[error("Conformers have {found} atoms, but the molecule has {expected}")]
    ConformerMismatch { expected: usize, found: usize },

    #[error("No free grid library exists for a {0} degree resolution")]
    UnsupportedGridResolution(f64),

    #[error("Coordinate conversion failed: {source}")]
    Conversion {
        #[from]
        source: ConversionError,
    },

    #[error("Template error: {source}")]
    Template {
        #[from]
        source: TemplateError,
    },

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
