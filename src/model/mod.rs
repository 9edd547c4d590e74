//! Symbolic model representation.
//!
//! Responsibilities:
//!
//! - expression trees with analytic differentiation (`Expr`)
//! - the fittable model wrapper with cached derivative trees
//!   (`SymbolicModel`)
//!
//! Formula-string parsing is a collaborator, not part of this crate: a
//! parser front-end is expected to produce the tree and hand it to
//! [`SymbolicModel::from_free_symbols`].

pub mod expr;
pub mod symbolic;

pub use expr::*;
pub use symbolic::*;
