//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they
//! can be:
//!
//! - used in-memory during fitting
//! - embedded in portable fit records
//! - reloaded later for comparisons

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// One observed data point.
///
/// `sx` / `sy` are optional per-point standard deviations. A value of `0.0`
/// means "exact for this point", which is different from `None` ("no
/// uncertainty information").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub sx: Option<f64>,
    pub sy: Option<f64>,
}

impl Observation {
    /// An observation with no uncertainty information.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            sx: None,
            sy: None,
        }
    }

    /// An observation with y-uncertainty only.
    pub fn with_sy(x: f64, y: f64, sy: f64) -> Self {
        Self {
            x,
            y,
            sx: None,
            sy: Some(sy),
        }
    }

    /// An observation with uncertainty in both variables.
    pub fn with_sx_sy(x: f64, y: f64, sx: f64, sy: f64) -> Self {
        Self {
            x,
            y,
            sx: Some(sx),
            sy: Some(sy),
        }
    }
}

/// An ordered, immutable sequence of observations.
///
/// Construction validates the statistical invariants: finite coordinates,
/// and finite non-negative uncertainties where present. The per-fit
/// requirement (`len >= n_params + 1`) is checked at fit time, when the
/// parameter count is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    points: Vec<Observation>,
}

/// Minimum observations for any fit, regardless of parameter count.
const MIN_POINTS: usize = 2;

impl Dataset {
    /// Validate and wrap a sequence of observations.
    pub fn new(points: Vec<Observation>) -> Result<Self> {
        if points.len() < MIN_POINTS {
            return Err(FitError::insufficient_data(MIN_POINTS, points.len()));
        }
        for (i, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite()) {
                return Err(FitError::domain(format!(
                    "non-finite observation at index {i}: ({}, {})",
                    p.x, p.y
                )));
            }
            for (label, s) in [("sx", p.sx), ("sy", p.sy)] {
                if let Some(s) = s {
                    if !s.is_finite() || s < 0.0 {
                        return Err(FitError::domain(format!(
                            "{label} at index {i} must be finite and >= 0, got {s}"
                        )));
                    }
                }
            }
        }
        Ok(Self { points })
    }

    /// Build a dataset from parallel x/y slices, without uncertainties.
    pub fn from_xy(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(FitError::domain(format!(
                "x/y length mismatch: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }
        Self::new(
            xs.iter()
                .zip(ys.iter())
                .map(|(&x, &y)| Observation::new(x, y))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Observed x-range as `(min, max)`.
    pub fn x_range(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &self.points {
            lo = lo.min(p.x);
            hi = hi.max(p.x);
        }
        (lo, hi)
    }

    /// True if any point carries x-uncertainty (including exact `sx = 0`).
    pub fn has_x_uncertainty(&self) -> bool {
        self.points.iter().any(|p| p.sx.is_some())
    }

    /// True if any point carries y-uncertainty.
    pub fn has_y_uncertainty(&self) -> bool {
        self.points.iter().any(|p| p.sy.is_some())
    }

    /// Per-point y-weights: `1/sy^2` where supplied, `1.0` where absent.
    ///
    /// `sy = 0` marks an exact observation, which the weighted objective
    /// cannot represent with a finite weight; it is rejected here rather
    /// than silently coerced.
    pub fn y_weights(&self) -> Result<Vec<f64>> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| match p.sy {
                None => Ok(1.0),
                Some(s) if s > 0.0 => Ok(1.0 / (s * s)),
                Some(_) => Err(FitError::domain(format!(
                    "sy = 0 at index {i} marks an exact observation; \
                     the weighted objective has no finite weight for it"
                ))),
            })
            .collect()
    }
}

/// Fitting method chosen from the uncertainty structure of a dataset.
///
/// This is a tagged variant rather than a runtime type check so the choice
/// is inspectable and testable independent of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// No per-point uncertainty anywhere: unweighted least squares.
    OrdinaryLeastSquares,
    /// y-uncertainty only: weighted least squares with weights `1/sy^2`.
    WeightedLeastSquares,
    /// Any x-uncertainty: orthogonal distance regression.
    OrthogonalDistance,
}

impl FitMethod {
    /// Human-readable label for summaries.
    pub fn display_name(self) -> &'static str {
        match self {
            FitMethod::OrdinaryLeastSquares => "OLS",
            FitMethod::WeightedLeastSquares => "WLS",
            FitMethod::OrthogonalDistance => "ODR",
        }
    }
}

/// Options that affect how a single fit is driven.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Relative parameter-change tolerance for convergence.
    pub tolerance: f64,
    /// Iteration cap; hitting it without tolerance satisfaction fails the
    /// fit with a convergence error.
    pub max_iterations: usize,
    /// Initial Levenberg-Marquardt damping factor.
    pub initial_damping: f64,
    /// Explicit starting point, in model parameter order. When absent a
    /// heuristic guess is screened from the data; a poor guess is a
    /// documented source of non-convergence, not a defect.
    pub initial_guess: Option<Vec<f64>>,
    /// Cooperative cancellation flag, checked between iterations. A
    /// cancelled fit fails with a convergence error carrying the full
    /// retry state.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 200,
            initial_damping: 1e-3,
            initial_guess: None,
            cancel: None,
        }
    }
}

/// Options for the intersection search.
#[derive(Debug, Clone)]
pub struct IntersectOptions {
    /// Number of grid intervals scanned for sign changes.
    pub scan_points: usize,
    /// Convergence tolerance for root refinement (in x).
    pub root_tolerance: f64,
    /// Slope threshold below which a contact is tagged as tangency rather
    /// than a crossing.
    pub tangency_tolerance: f64,
    /// Explicit search window. Must lie within the union of the two
    /// observed x-ranges; defaults to their overlap.
    pub window: Option<(f64, f64)>,
}

impl Default for IntersectOptions {
    fn default() -> Self {
        Self {
            scan_points: 256,
            root_tolerance: 1e-10,
            tangency_tolerance: 1e-8,
            window: None,
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub reduced_chi_square: f64,
    pub n: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_rejects_non_finite_points() {
        let err = Dataset::new(vec![
            Observation::new(0.0, 1.0),
            Observation::new(f64::NAN, 2.0),
        ])
        .unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn dataset_rejects_negative_uncertainty() {
        let err = Dataset::new(vec![
            Observation::with_sy(0.0, 1.0, -0.5),
            Observation::new(1.0, 2.0),
        ])
        .unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn dataset_accepts_zero_uncertainty_as_exact() {
        let data = Dataset::new(vec![
            Observation::with_sx_sy(0.0, 1.0, 0.0, 1.0),
            Observation::with_sx_sy(1.0, 2.0, 0.1, 1.0),
        ])
        .unwrap();
        assert!(data.has_x_uncertainty());
        assert!(data.has_y_uncertainty());
    }

    #[test]
    fn dataset_needs_two_points() {
        let err = Dataset::new(vec![Observation::new(0.0, 1.0)]).unwrap_err();
        assert_eq!(
            err,
            FitError::InsufficientData {
                required: 2,
                provided: 1
            }
        );
    }

    #[test]
    fn y_weights_invert_variances() {
        let data = Dataset::new(vec![
            Observation::with_sy(0.0, 1.0, 2.0),
            Observation::new(1.0, 2.0),
        ])
        .unwrap();
        let w = data.y_weights().unwrap();
        assert!((w[0] - 0.25).abs() < 1e-15);
        assert!((w[1] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn y_weights_reject_exact_observation() {
        let data = Dataset::new(vec![
            Observation::with_sy(0.0, 1.0, 0.0),
            Observation::new(1.0, 2.0),
        ])
        .unwrap();
        assert!(data.y_weights().unwrap_err().is_domain());
    }

    #[test]
    fn x_range_spans_observations() {
        let data = Dataset::from_xy(&[3.0, -1.0, 2.0], &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(data.x_range(), (-1.0, 3.0));
    }
}
