//! Initial-guess handling.
//!
//! When the caller supplies no starting point we screen a small candidate
//! set and keep the one with the lowest finite sum of squared residuals:
//!
//! - all ones (the classical default for curve fitting)
//! - all parameters at the mean observed y (levels)
//! - all parameters at the edge-to-edge slope of the data
//! - slope/intercept seeded from the data edges
//!
//! Candidates are independent, so they are screened in parallel. A missing
//! or poor guess is a documented source of non-convergence, not a defect;
//! the screening only improves the odds.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{Dataset, FitOptions};
use crate::error::{FitError, Result};
use crate::model::SymbolicModel;

/// Resolve the starting parameter vector for a fit.
pub fn initial_guess(
    model: &SymbolicModel,
    data: &Dataset,
    options: &FitOptions,
) -> Result<Vec<f64>> {
    if let Some(guess) = &options.initial_guess {
        if guess.len() != model.n_params() {
            return Err(FitError::domain(format!(
                "initial guess has {} values, model has {} parameters",
                guess.len(),
                model.n_params()
            )));
        }
        if let Some(bad) = guess.iter().find(|v| !v.is_finite()) {
            return Err(FitError::domain(format!(
                "initial guess contains a non-finite value ({bad})"
            )));
        }
        return Ok(guess.clone());
    }

    let p = model.n_params();
    let xs = data.xs();
    let ys = data.ys();

    let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
    let (x_lo, x_hi) = data.x_range();
    let span = x_hi - x_lo;
    let slope = if span.abs() > 0.0 {
        (ys[ys.len() - 1] - ys[0]) / span
    } else {
        1.0
    };

    let mut candidates: Vec<Vec<f64>> = vec![
        vec![1.0; p],
        vec![mean_y; p],
        vec![slope; p],
    ];
    if p >= 2 {
        // Slope first, level second, ones for the rest. Parameter order is
        // unknown, but the screening only needs one candidate to land in a
        // reasonable basin.
        let mut seeded = vec![1.0; p];
        seeded[0] = slope;
        seeded[1] = mean_y;
        candidates.push(seeded);
    }
    candidates.retain(|c| c.iter().all(|v| v.is_finite()));

    // Score each candidate by unweighted SSE; evaluation failures just
    // drop the candidate.
    let best = candidates
        .par_iter()
        .filter_map(|candidate| {
            let fitted = model.evaluate_many(&xs, candidate).ok()?;
            let sse: f64 = fitted
                .iter()
                .zip(ys.iter())
                .map(|(f, y)| (y - f) * (y - f))
                .sum();
            sse.is_finite().then(|| (candidate.clone(), sse))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((candidate, sse)) => {
            debug!(sse, ?candidate, "screened initial guess");
            Ok(candidate)
        }
        None => Ok(vec![1.0; p]),
    }
}
