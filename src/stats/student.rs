//! Student's T distribution helpers.
//!
//! Thin wrappers over statrs that map construction failures into the
//! crate's error taxonomy and centralize the dof validation shared by the
//! confidence-interval and hypothesis-test paths.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{FitError, Result};

fn standard_t(dof: usize) -> Result<StudentsT> {
    if dof == 0 {
        return Err(FitError::insufficient_data(1, 0));
    }
    StudentsT::new(0.0, 1.0, dof as f64)
        .map_err(|e| FitError::domain(format!("invalid Student-T parameters: {e}")))
}

/// CDF of the standard Student's T with `dof` degrees of freedom.
pub fn cdf(x: f64, dof: usize) -> Result<f64> {
    Ok(standard_t(dof)?.cdf(x))
}

/// Quantile (inverse CDF) of the standard Student's T.
pub fn quantile(p: f64, dof: usize) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(FitError::domain(format!(
            "quantile probability must be in (0, 1), got {p}"
        )));
    }
    Ok(standard_t(dof)?.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_is_half_at_zero() {
        assert!((cdf(0.0, 5).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn quantile_inverts_cdf() {
        let q = quantile(0.975, 10).unwrap();
        assert!((cdf(q, 10).unwrap() - 0.975).abs() < 1e-9);
    }

    #[test]
    fn known_critical_value() {
        // t_{0.975, 10} ≈ 2.228 (standard tables).
        let q = quantile(0.975, 10).unwrap();
        assert!((q - 2.228).abs() < 5e-3, "q = {q}");
    }

    #[test]
    fn zero_dof_is_insufficient_data() {
        assert!(cdf(0.0, 0).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn out_of_range_probability_is_domain_error() {
        assert!(quantile(1.5, 5).unwrap_err().is_domain());
    }
}
