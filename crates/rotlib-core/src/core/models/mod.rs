//! Data structures describing the molecule being turned into a rotamer-enabled residue.
//!
//! A [`molecule::MoleculeGraph`] owns the [`atom::Atom`]s and [`topology::Bond`]s parsed from a
//! structure file and answers adjacency and ring queries. Sampled geometries live separately in
//! a [`conformer::ConformerSet`] so the graph stays immutable once built.

pub mod atom;
pub mod conformer;
pub mod molecule;
pub mod topology;
