//! Damped Gauss-Newton (Levenberg-Marquardt) minimization.
//!
//! The engine is generic over the residual vector and its Jacobian so the
//! vertical-distance path and the orthogonal-distance path share one loop:
//!
//! - solve `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` for the step
//! - accept the step if the weighted SSE decreases, shrinking λ
//! - otherwise grow λ and retry from the same point
//!
//! A trial step that leaves the model's numeric domain counts as a
//! rejected step (λ grows), so the optimizer walks around invalid regions
//! instead of aborting. Domain failures at an *accepted* point propagate:
//! they mean the caller's starting point is itself invalid.

use std::sync::atomic::Ordering;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{Dataset, FitOptions};
use crate::error::{FitError, Result};
use crate::math::{covariance_from_weighted_jacobian, solve_spd};
use crate::model::SymbolicModel;

/// Damping growth/shrink factors.
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
/// Damping ceiling; failing to find an acceptable step below it means the
/// iteration has stalled.
const LAMBDA_MAX: f64 = 1e14;
/// Offset guarding the relative step-size test against zero parameters.
const STEP_GUARD: f64 = 1e-12;

/// Raw optimizer output, before covariance scaling and result assembly.
#[derive(Debug, Clone)]
pub(crate) struct LmOutcome {
    /// Converged parameter estimate.
    pub params: Vec<f64>,
    /// Iterations actually performed.
    pub iterations: usize,
    /// Sum of squared (weighted) residuals at the solution.
    pub sse: f64,
    /// Residual Jacobian `∂r/∂θ` at the solution.
    pub jacobian: DMatrix<f64>,
}

/// Minimize `‖r(θ)‖²` with analytic Jacobian `∂r/∂θ`.
pub(crate) fn levenberg_marquardt<R, J>(
    residual: &R,
    jacobian: &J,
    guess: &[f64],
    options: &FitOptions,
) -> Result<LmOutcome>
where
    R: Fn(&[f64]) -> Result<DVector<f64>>,
    J: Fn(&[f64]) -> Result<DMatrix<f64>>,
{
    let p = guess.len();
    let mut theta = DVector::from_column_slice(guess);
    let mut r = residual(theta.as_slice())?;
    let mut sse = r.norm_squared();
    let mut lambda = options.initial_damping;

    for iteration in 1..=options.max_iterations {
        if let Some(cancel) = &options.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(FitError::convergence(
                    iteration,
                    sse.sqrt(),
                    theta.as_slice().to_vec(),
                ));
            }
        }

        let j = jacobian(theta.as_slice())?;
        let jtj = j.transpose() * &j;
        let neg_gradient = -(j.transpose() * &r);

        // A zero diagonal entry means some parameter has no influence on
        // any residual: structurally unidentifiable, damping cannot fix it.
        let nonzero = jtj
            .diagonal()
            .iter()
            .filter(|d| **d > 0.0 && d.is_finite())
            .count();
        if nonzero < p {
            return Err(FitError::singular_jacobian(nonzero, p));
        }

        // Inner loop: grow lambda until a step is both solvable and an
        // improvement.
        let accepted = loop {
            let mut damped = jtj.clone();
            for i in 0..p {
                damped[(i, i)] += lambda * jtj[(i, i)];
            }

            let step = match solve_spd(&damped, &neg_gradient) {
                Some(step) => step,
                None => {
                    lambda *= LAMBDA_UP;
                    if lambda > LAMBDA_MAX {
                        break None;
                    }
                    continue;
                }
            };

            let trial = &theta + &step;
            match residual(trial.as_slice()) {
                Ok(r_trial) => {
                    let sse_trial = r_trial.norm_squared();
                    if sse_trial.is_finite() && sse_trial <= sse {
                        break Some((trial, r_trial, sse_trial, step));
                    }
                }
                Err(e) if e.is_domain() => {
                    // Step left the valid domain: reject it like any
                    // non-improving step.
                }
                Err(e) => return Err(e),
            }

            lambda *= LAMBDA_UP;
            if lambda > LAMBDA_MAX {
                break None;
            }
        };

        let Some((trial, r_trial, sse_trial, step)) = accepted else {
            // No acceptable step exists at any damping level: the iterate
            // cannot improve further but never met the tolerance.
            return Err(FitError::convergence(
                iteration,
                sse.sqrt(),
                theta.as_slice().to_vec(),
            ));
        };

        let rel_step = step
            .iter()
            .zip(theta.iter())
            .map(|(d, t)| d.abs() / (t.abs() + STEP_GUARD))
            .fold(0.0_f64, f64::max);

        theta = trial;
        r = r_trial;
        sse = sse_trial;
        lambda = (lambda * LAMBDA_DOWN).max(1e-12);

        debug!(iteration, sse, lambda, rel_step, "lm step accepted");

        if rel_step < options.tolerance {
            let j_final = jacobian(theta.as_slice())?;
            return Ok(LmOutcome {
                params: theta.as_slice().to_vec(),
                iterations: iteration,
                sse,
                jacobian: j_final,
            });
        }
    }

    Err(FitError::convergence(
        options.max_iterations,
        sse.sqrt(),
        theta.as_slice().to_vec(),
    ))
}

/// Vertical-distance fit output.
#[derive(Debug, Clone)]
pub(crate) struct WeightedFit {
    pub params: Vec<f64>,
    /// Unscaled covariance `(JᵀWJ)⁻¹`; the driver applies the reduced
    /// chi-square factor when weights were not supplied as true variances.
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
    /// Weighted SSE (equals the chi-square when weights are `1/sy²`).
    pub sse: f64,
}

/// Minimize `Σ wᵢ·(yᵢ − f(xᵢ; θ))²`.
pub(crate) fn solve_weighted(
    model: &SymbolicModel,
    data: &Dataset,
    weights: &[f64],
    guess: &[f64],
    options: &FitOptions,
) -> Result<WeightedFit> {
    let xs = data.xs();
    let ys = data.ys();
    let n = xs.len();
    let p = model.n_params();
    let sqrt_w: Vec<f64> = weights.iter().map(|w| w.sqrt()).collect();

    let residual = |theta: &[f64]| -> Result<DVector<f64>> {
        let fitted = model.evaluate_many(&xs, theta)?;
        Ok(DVector::from_iterator(
            n,
            fitted
                .iter()
                .zip(ys.iter())
                .zip(sqrt_w.iter())
                .map(|((f, y), sw)| sw * (y - f)),
        ))
    };

    let jacobian = |theta: &[f64]| -> Result<DMatrix<f64>> {
        let mut j = DMatrix::zeros(n, p);
        for (i, &x) in xs.iter().enumerate() {
            let g = model.gradient(x, theta)?;
            for k in 0..p {
                j[(i, k)] = -sqrt_w[i] * g[k];
            }
        }
        Ok(j)
    };

    let outcome = levenberg_marquardt(&residual, &jacobian, guess, options)?;
    // ∂r/∂θ = -√W·J differs from √W·J only by sign, which the Gram matrix
    // in the covariance does not see.
    let covariance = covariance_from_weighted_jacobian(&outcome.jacobian)?;

    Ok(WeightedFit {
        params: outcome.params,
        covariance,
        iterations: outcome.iterations,
        sse: outcome.sse,
    })
}
