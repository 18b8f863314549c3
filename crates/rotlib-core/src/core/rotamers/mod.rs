//! # Rotamer Libraries
//!
//! Everything needed to turn sampled torsion values into the artifacts the docking engine
//! reads: grid quantization ([`grid`]), library files ([`library`]) and the assignment
//! script that binds libraries to bonds and groups ([`assignment`]).
//!
//! All output here is a fixed columnar wire format; field widths and justification are
//! reproduced exactly and covered by byte-level tests.

pub mod assignment;
pub mod grid;
pub mod library;
