//! Parameter inference: confidence intervals and hypothesis tests.
//!
//! Both operations work on the marginal standard error (the square root of
//! the matching diagonal covariance entry) with a Student's T distribution
//! at `n_points − n_params` degrees of freedom.

use crate::error::{FitError, Result};
use crate::fit::FitResult;
use crate::stats::student;

/// Outcome of a two-sided T test on a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct TTest {
    /// `(estimate − null_value) / std_error`
    pub t_statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Marginal standard error used for the test.
    pub std_error: f64,
    /// Degrees of freedom of the reference distribution.
    pub dof: usize,
}

fn marginal(fit: &FitResult, param: &str) -> Result<(f64, f64)> {
    let estimate = fit
        .parameter(param)
        .ok_or_else(|| FitError::undefined_parameter(param))?;
    // parameter() succeeded, so the index exists.
    let se = fit
        .std_error(param)
        .ok_or_else(|| FitError::undefined_parameter(param))?;
    if !se.is_finite() || se <= 0.0 {
        return Err(FitError::domain(format!(
            "parameter `{param}` has zero or non-finite marginal variance; \
             no inference is possible on it"
        )));
    }
    Ok((estimate, se))
}

fn check_dof(fit: &FitResult) -> Result<usize> {
    let dof = fit.degrees_of_freedom();
    if dof == 0 {
        return Err(FitError::insufficient_data(
            fit.parameters().len() + 1,
            fit.dataset().len(),
        ));
    }
    Ok(dof)
}

/// Two-sided confidence interval for a named parameter.
///
/// `level` is the coverage probability, e.g. `0.95`.
pub fn confidence_interval(fit: &FitResult, param: &str, level: f64) -> Result<(f64, f64)> {
    if !(level > 0.0 && level < 1.0) {
        return Err(FitError::domain(format!(
            "confidence level must be in (0, 1), got {level}"
        )));
    }
    let dof = check_dof(fit)?;
    let (estimate, se) = marginal(fit, param)?;
    let t = student::quantile(0.5 + level / 2.0, dof)?;
    Ok((estimate - t * se, estimate + t * se))
}

/// Two-sided T test of `H0: parameter = null_value`.
pub fn hypothesis_test(fit: &FitResult, param: &str, null_value: f64) -> Result<TTest> {
    let dof = check_dof(fit)?;
    let (estimate, se) = marginal(fit, param)?;
    let t_statistic = (estimate - null_value) / se;
    let p_value = 2.0 * (1.0 - student::cdf(t_statistic.abs(), dof)?);
    Ok(TTest {
        t_statistic,
        p_value,
        std_error: se,
        dof,
    })
}
