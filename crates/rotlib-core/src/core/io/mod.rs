//! Provides input/output functionality for the file formats involved in a library build.
//!
//! Structure input is read from Maestro-style `.mae` files ([`mae`]), rotatable bonds from
//! CSV lists ([`torsions`]) and residue z-matrix templates from the docking engine's template
//! format ([`template`]). The shared reading/writing interface lives in [`traits`].

pub mod mae;
pub mod template;
pub mod torsions;
pub mod traits;
