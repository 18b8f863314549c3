//! # Core Module
//!
//! The fundamental building blocks used by every rotamer library build.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, torsions, rings, the molecule
//!   graph and conformer sets
//! - **File I/O** ([`io`]) - Structure input, rotatable-bond lists and z-matrix templates
//! - **Geometry** ([`geometry`]) - Cartesian and internal (z-matrix) coordinate conversion
//! - **Rotamer Libraries** ([`rotamers`]) - Grid quantization, library files and assignment scripts
//!
//! Nothing in this module holds state across builds; every type is either an immutable
//! value produced by a parser or a pure function over such values.

pub mod geometry;
pub mod io;
pub mod models;
pub mod rotamers;
