//! Geometric transforms between Cartesian coordinates and z-matrix internal coordinates.

pub mod zmatrix;
