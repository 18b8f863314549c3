//! # rotlib Core Library
//!
//! A library for turning a small molecule (or an unnatural amino acid) into a rotamer-enabled
//! residue for a molecular mechanics docking engine: it picks a rigid core, orders the atoms
//! into a z-matrix tree, groups the rotatable bonds into independent side-chain libraries and
//! writes the grid libraries and assignment script the engine consumes.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MoleculeGraph`), file formats
//!   (structure input, torsion lists, z-matrix templates, library files) and the pure
//!   Cartesian/internal coordinate transforms.
//!
//! - **[`engine`]: The Logic Core.** The graph algorithms that decide the shape of the tree:
//!   rigid-core selection and ranking, ring merging, and tree construction, together with
//!   the build configuration, error types and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into the complete
//!   library-building procedure.

pub mod core;
pub mod engine;
pub mod workflows;
