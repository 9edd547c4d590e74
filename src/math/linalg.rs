//! Dense linear algebra for the fitting loop.
//!
//! Two small problems are solved repeatedly:
//!
//! - the damped normal equations `(JᵀJ + λD) δ = g` inside each
//!   Levenberg-Marquardt iteration
//! - the parameter covariance `(JᵀWJ)⁻¹` at the solution
//!
//! Implementation choices:
//! - Cholesky first for the damped system (it is positive definite for
//!   λ > 0 unless a Jacobian column is identically zero), SVD as fallback.
//! - SVD with progressively looser tolerances for the fallback solve, since
//!   near-collinear gradient columns are common for poorly identified
//!   parameter sets.
//! - The covariance is computed from the SVD of the weighted Jacobian
//!   itself (never by explicitly inverting JᵀWJ), with rank detection so a
//!   deficient Jacobian is reported instead of quietly pseudo-inverted.

use nalgebra::{DMatrix, DVector};

use crate::error::{FitError, Result};

/// Solve a symmetric positive-(semi)definite system.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }

    // Try progressively looser tolerances if the strict solve fails.
    let svd = a.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

/// Parameter covariance from the weighted Jacobian `√W·J` (n rows, p cols).
///
/// Computes `(JᵀWJ)⁻¹ = V Σ⁻² Vᵀ` via SVD. Fails with a singular-Jacobian
/// error when the numerical rank is below `p`, which flags an
/// unidentifiable parameter set rather than returning an unusable
/// pseudo-covariance.
pub fn covariance_from_weighted_jacobian(jw: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let p = jw.ncols();
    let n = jw.nrows();

    let svd = jw.clone().svd(false, true);
    let sigma = &svd.singular_values;
    let sigma_max = sigma.iter().cloned().fold(0.0_f64, f64::max);
    let tol = sigma_max * (n.max(p) as f64) * f64::EPSILON;

    let rank = sigma.iter().filter(|s| **s > tol).count();
    if rank < p {
        return Err(FitError::singular_jacobian(rank, p));
    }

    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| FitError::singular_jacobian(rank, p))?;

    // Cov = V Σ⁻² Vᵀ, accumulated column-by-column. p is tiny, so the
    // explicit loop is clearer than building diagonal matrices.
    let mut cov = DMatrix::<f64>::zeros(p, p);
    for k in 0..p {
        let s2 = sigma[k] * sigma[k];
        for i in 0..p {
            for j in 0..p {
                cov[(i, j)] += v_t[(k, i)] * v_t[(k, j)] / s2;
            }
        }
    }
    Ok(cov)
}
