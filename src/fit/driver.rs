//! Fit orchestration.
//!
//! `fit` is the single entry point: it validates the degrees of freedom
//! before any solver call, selects the method from the dataset's
//! uncertainty structure, resolves the starting point, drives the matching
//! solver, and applies the covariance scaling convention:
//!
//! - weights supplied as true variances (any sy present): σ² = 1
//! - no y-uncertainty: σ² = reduced chi-square, i.e. the covariance is
//!   rescaled by the observed residual variance
//!
//! The engine performs no automatic retry across methods; callers decide
//! whether to retry with a different guess or method.

use std::sync::Arc;

use tracing::info;

use crate::domain::{Dataset, FitMethod, FitOptions};
use crate::error::{FitError, Result};
use crate::fit::guess::initial_guess;
use crate::fit::least_squares::solve_weighted;
use crate::fit::odr::solve_orthogonal;
use crate::fit::result::FitResult;
use crate::fit::selector::select_method;
use crate::model::SymbolicModel;

/// Fit a symbolic model to a dataset.
pub fn fit(
    model: &Arc<SymbolicModel>,
    dataset: &Arc<Dataset>,
    options: &FitOptions,
) -> Result<FitResult> {
    let n = dataset.len();
    let p = model.n_params();
    let required = p + 1;
    if n < required {
        return Err(FitError::insufficient_data(required, n));
    }
    let dof = n - p;

    let method = select_method(dataset);
    let guess = initial_guess(model, dataset, options)?;

    let (params, mut covariance, iterations, weighted_sse) = match method {
        FitMethod::OrdinaryLeastSquares => {
            let out = solve_weighted(model, dataset, &vec![1.0; n], &guess, options)?;
            (out.params, out.covariance, out.iterations, out.sse)
        }
        FitMethod::WeightedLeastSquares => {
            let weights = dataset.y_weights()?;
            let out = solve_weighted(model, dataset, &weights, &guess, options)?;
            (out.params, out.covariance, out.iterations, out.sse)
        }
        FitMethod::OrthogonalDistance => {
            let out = solve_orthogonal(model, dataset, &guess, options)?;
            (out.params, out.covariance, out.iterations, out.sse)
        }
    };

    // Reduced chi-square rescaling applies exactly when no supplied
    // uncertainty fixes the scale of the objective.
    if !dataset.has_y_uncertainty() {
        covariance *= weighted_sse / dof as f64;
    }

    let fitted = model.evaluate_many(&dataset.xs(), &params)?;
    let residuals: Vec<f64> = dataset
        .ys()
        .iter()
        .zip(fitted.iter())
        .map(|(y, f)| y - f)
        .collect();

    info!(
        method = method.display_name(),
        iterations,
        weighted_sse,
        dof,
        "fit completed"
    );

    Ok(FitResult::new(
        Arc::clone(model),
        Arc::clone(dataset),
        method,
        params,
        covariance,
        dof,
        residuals,
        weighted_sse,
        iterations,
    ))
}
