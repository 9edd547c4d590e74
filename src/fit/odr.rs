//! Orthogonal distance regression.
//!
//! When x carries uncertainty, vertical residuals understate the error
//! structure. ODR jointly estimates the parameters and a per-point shift
//! `δᵢ` of the true abscissa, minimizing
//!
//! ```text
//! Σ wyᵢ·(yᵢ − f(xᵢ + δᵢ; θ))²  +  Σ wxᵢ·δᵢ²
//! ```
//!
//! with `wx = 1/sx²` and `wy = 1/sy²` (unit weights where sy is absent).
//! The stacked residual vector `[√wy·(y − f(x+δ)), √wx·δ]` over the
//! unknowns `[θ; δ]` feeds the same Levenberg-Marquardt loop as the
//! vertical path. Points with `sx = 0` (exact) or no `sx` at all keep
//! their shift pinned at zero and contribute no δ-unknown.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Dataset, FitOptions};
use crate::error::Result;
use crate::fit::least_squares::levenberg_marquardt;
use crate::math::covariance_from_weighted_jacobian;
use crate::model::SymbolicModel;

/// Orthogonal-distance fit output.
#[derive(Debug, Clone)]
pub(crate) struct OdrFit {
    pub params: Vec<f64>,
    /// Unscaled parameter covariance: top-left p×p block of the joint
    /// `(JᵀJ)⁻¹`, so δ-correlations are marginalized, not ignored.
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
    /// Weighted SSE of the joint objective at the solution.
    pub sse: f64,
    /// Estimated x-shifts, zero where the shift was pinned.
    pub x_shifts: Vec<f64>,
}

/// Fit `model` to `data` by orthogonal distance regression.
pub(crate) fn solve_orthogonal(
    model: &SymbolicModel,
    data: &Dataset,
    guess: &[f64],
    options: &FitOptions,
) -> Result<OdrFit> {
    let xs = data.xs();
    let ys = data.ys();
    let n = xs.len();
    let p = model.n_params();

    let sqrt_wy: Vec<f64> = data.y_weights()?.iter().map(|w| w.sqrt()).collect();

    // Free shifts: one unknown per point with a strictly positive sx.
    let free: Vec<usize> = data
        .points()
        .iter()
        .enumerate()
        .filter_map(|(i, obs)| match obs.sx {
            Some(sx) if sx > 0.0 => Some(i),
            _ => None,
        })
        .collect();
    let m = free.len();
    let sqrt_wx: Vec<f64> = free
        .iter()
        .map(|&i| {
            let sx = data.points()[i].sx.unwrap_or(1.0);
            1.0 / sx
        })
        .collect();
    // Position of each point's shift inside the unknown vector, if any.
    let slot_of: Vec<Option<usize>> = {
        let mut slots = vec![None; n];
        for (jj, &i) in free.iter().enumerate() {
            slots[i] = Some(jj);
        }
        slots
    };

    let effective_x = |u: &[f64], i: usize| -> f64 {
        match slot_of[i] {
            Some(jj) => xs[i] + u[p + jj],
            None => xs[i],
        }
    };

    let residual = |u: &[f64]| -> Result<DVector<f64>> {
        let theta = &u[..p];
        let mut r = DVector::zeros(n + m);
        for i in 0..n {
            let fx = model.evaluate(effective_x(u, i), theta)?;
            r[i] = sqrt_wy[i] * (ys[i] - fx);
        }
        for jj in 0..m {
            r[n + jj] = sqrt_wx[jj] * u[p + jj];
        }
        Ok(r)
    };

    let jacobian = |u: &[f64]| -> Result<DMatrix<f64>> {
        let theta = &u[..p];
        let mut j = DMatrix::zeros(n + m, p + m);
        for i in 0..n {
            let xi = effective_x(u, i);
            let g = model.gradient(xi, theta)?;
            for k in 0..p {
                j[(i, k)] = -sqrt_wy[i] * g[k];
            }
            if let Some(jj) = slot_of[i] {
                j[(i, p + jj)] = -sqrt_wy[i] * model.partial_wrt_x(xi, theta)?;
            }
        }
        for jj in 0..m {
            j[(n + jj, p + jj)] = sqrt_wx[jj];
        }
        Ok(j)
    };

    let mut joint_guess = Vec::with_capacity(p + m);
    joint_guess.extend_from_slice(guess);
    joint_guess.extend(std::iter::repeat(0.0).take(m));

    let outcome = levenberg_marquardt(&residual, &jacobian, &joint_guess, options)?;

    let joint_cov = covariance_from_weighted_jacobian(&outcome.jacobian)?;
    let covariance = joint_cov.view((0, 0), (p, p)).into_owned();

    let mut x_shifts = vec![0.0; n];
    for (jj, &i) in free.iter().enumerate() {
        x_shifts[i] = outcome.params[p + jj];
    }

    Ok(OdrFit {
        params: outcome.params[..p].to_vec(),
        covariance,
        iterations: outcome.iterations,
        sse: outcome.sse,
        x_shifts,
    })
}
