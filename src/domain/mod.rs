//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - observed data (`Observation`, `Dataset`) and its invariants
//! - the fitting-method tag (`FitMethod`)
//! - options structs (`FitOptions`, `IntersectOptions`)
//! - fit diagnostics (`FitQuality`)

pub mod types;

pub use types::*;
