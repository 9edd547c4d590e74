//! Dataset generation helpers for tests and examples.

pub mod simulate;

pub use simulate::*;
