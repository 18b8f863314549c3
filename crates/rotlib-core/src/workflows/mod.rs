//! # Workflows Module
//!
//! High-level entry points that run a complete library build.
//!
//! ## Overview
//!
//! A workflow takes parsed inputs and an immutable [`crate::engine::config::BuildConfig`],
//! drives the engine from torsion discovery through tree construction, and returns every
//! artifact the docking engine needs, ready to be written to disk.
//!
//! ## Architecture
//!
//! - **Build Workflow** ([`build`]) - Core selection, tree construction, library generation,
//!   the assignment script and template reordering.

pub mod build;
