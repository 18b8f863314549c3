//! # Engine Module
//!
//! Graph algorithms that turn a molecule and its rotatable bonds into a z-matrix tree.
//!
//! ## Overview
//!
//! A library build first picks a root whose rigid core keeps every rotatable chain as short
//! as possible, then labels each atom with its rank (hops from the core) and its branch
//! group, and finally lays the atoms out as a parent-pointer tree that the coordinate
//! converter can walk.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable build settings and their builder
//! - **Core Selection** ([`core_selector`]) - Rigid components, ranks, root choice, groups and
//!   the per-group torsion ceiling
//! - **Ring Merging** ([`rings`]) - Promotion of ring bonds to jointly sampled ring torsions
//! - **Tree Building** ([`tree`]) - Ordering and parent arrays, plus torsion anchoring
//! - **Progress Monitoring** ([`progress`]) - Phase and task callbacks
//! - **Error Handling** ([`error`]) - Engine error taxonomy

pub mod config;
pub mod core_selector;
pub mod error;
pub mod progress;
pub mod rings;
pub mod tree;
