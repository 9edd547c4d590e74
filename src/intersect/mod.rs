//! Curve intersection search with uncertainty propagation.

pub mod solver;

pub use solver::*;
