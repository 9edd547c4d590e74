//! Immutable record of a completed fit.
//!
//! A `FitResult` owns the fitted parameter vector, the parameter
//! covariance, the residual vector and the degrees of freedom, and shares
//! (not owns) the model and dataset it was fitted from. Downstream
//! computations — prediction, intervals, intersections, hypothesis tests —
//! read it but never mutate it; derived scalars are computed once and
//! cached.

use std::sync::{Arc, OnceLock};

use nalgebra::{DMatrix, DVector};

use crate::domain::{Dataset, FitMethod, FitQuality};
use crate::error::{FitError, Result};
use crate::model::SymbolicModel;
use crate::stats::student;

/// A completed fit: parameters, covariance, residuals, statistics.
#[derive(Debug)]
pub struct FitResult {
    model: Arc<SymbolicModel>,
    dataset: Arc<Dataset>,
    method: FitMethod,
    params: Vec<f64>,
    covariance: DMatrix<f64>,
    dof: usize,
    residuals: Vec<f64>,
    weighted_sse: f64,
    iterations: usize,
    r_squared: OnceLock<f64>,
    adjusted_r_squared: OnceLock<f64>,
}

impl FitResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        model: Arc<SymbolicModel>,
        dataset: Arc<Dataset>,
        method: FitMethod,
        params: Vec<f64>,
        covariance: DMatrix<f64>,
        dof: usize,
        residuals: Vec<f64>,
        weighted_sse: f64,
        iterations: usize,
    ) -> Self {
        Self {
            model,
            dataset,
            method,
            params,
            covariance,
            dof,
            residuals,
            weighted_sse,
            iterations,
            r_squared: OnceLock::new(),
            adjusted_r_squared: OnceLock::new(),
        }
    }

    pub fn model(&self) -> &Arc<SymbolicModel> {
        &self.model
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn method(&self) -> FitMethod {
        self.method
    }

    /// Iterations the solver needed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Degrees of freedom: data points minus free parameters.
    pub fn degrees_of_freedom(&self) -> usize {
        self.dof
    }

    /// Parameter names, in model declaration order.
    pub fn parameter_names(&self) -> &[String] {
        self.model.param_names()
    }

    /// Fitted parameter values, aligned with [`Self::parameter_names`].
    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    /// Fitted value of a single named parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.model.param_index(name).map(|i| self.params[i])
    }

    /// Marginal standard error of a named parameter.
    pub fn std_error(&self, name: &str) -> Option<f64> {
        self.model
            .param_index(name)
            .map(|i| self.covariance[(i, i)].sqrt())
    }

    /// Parameter covariance matrix (symmetric, positive-semidefinite).
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Parameter correlation matrix.
    ///
    /// Entries involving a zero-variance parameter are NaN, mirroring the
    /// convention that a correlation with a fully determined quantity is
    /// undefined.
    pub fn correlation(&self) -> DMatrix<f64> {
        let p = self.params.len();
        let mut out = DMatrix::zeros(p, p);
        for i in 0..p {
            for j in 0..p {
                let vi = self.covariance[(i, i)];
                let vj = self.covariance[(j, j)];
                out[(i, j)] = if vi == 0.0 || vj == 0.0 {
                    f64::NAN
                } else {
                    self.covariance[(i, j)] / (vi * vj).sqrt()
                };
            }
        }
        out
    }

    /// Raw residuals `yᵢ − f(xᵢ)`, in dataset order.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Unweighted residual sum of squares.
    pub fn sse(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }

    /// Predict `y` at `x` from the fitted parameters.
    pub fn predict(&self, x: f64) -> Result<f64> {
        self.model.evaluate(x, &self.params)
    }

    /// Predict over an ordered sequence of x-values.
    pub fn predict_many(&self, xs: &[f64]) -> Result<Vec<f64>> {
        self.model.evaluate_many(xs, &self.params)
    }

    /// First-order variance of the prediction at `x`:
    /// `var(ŷ) = gᵀ·Cov·g` with `g = ∇θ f(x; θ̂)`.
    pub fn predict_variance(&self, x: f64) -> Result<f64> {
        let g: DVector<f64> = self.model.gradient(x, &self.params)?;
        Ok(g.dot(&(&self.covariance * &g)))
    }

    /// Confidence band for the fitted curve at `x`.
    ///
    /// The half-width is the Student-T quantile at the requested level
    /// times the propagated standard error, so the width is monotonically
    /// non-decreasing in `confidence`.
    pub fn predict_interval(&self, x: f64, confidence: f64) -> Result<(f64, f64)> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(FitError::domain(format!(
                "confidence level must be in (0, 1), got {confidence}"
            )));
        }
        let center = self.predict(x)?;
        let se = self.predict_variance(x)?.sqrt();
        let t = student::quantile(0.5 + confidence / 2.0, self.dof)?;
        Ok((center - t * se, center + t * se))
    }

    /// Coefficient of determination of the fit.
    pub fn r_squared(&self) -> f64 {
        *self.r_squared.get_or_init(|| {
            let ys = self.dataset.ys();
            let mean = ys.iter().sum::<f64>() / ys.len() as f64;
            let ss_tot: f64 = ys.iter().map(|y| (y - mean) * (y - mean)).sum();
            1.0 - self.sse() / ss_tot
        })
    }

    /// R² penalized for model complexity.
    pub fn adjusted_r_squared(&self) -> f64 {
        *self.adjusted_r_squared.get_or_init(|| {
            let n = self.dataset.len() as f64;
            let df_total = n - 1.0;
            let df_error = self.dof as f64 - 1.0;
            let ys = self.dataset.ys();
            let mean = ys.iter().sum::<f64>() / ys.len() as f64;
            let ss_tot: f64 = ys.iter().map(|y| (y - mean) * (y - mean)).sum();
            1.0 - (self.sse() / df_error) / (ss_tot / df_total)
        })
    }

    /// Weighted residual sum of squares divided by the degrees of freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        self.weighted_sse / self.dof as f64
    }

    /// Observed x-range of the underlying dataset.
    pub fn x_range(&self) -> (f64, f64) {
        self.dataset.x_range()
    }

    /// Quality diagnostics in one block.
    pub fn quality(&self) -> FitQuality {
        let n = self.dataset.len();
        let sse = self.sse();
        FitQuality {
            sse,
            rmse: (sse / n as f64).sqrt(),
            r_squared: self.r_squared(),
            adjusted_r_squared: self.adjusted_r_squared(),
            reduced_chi_square: self.reduced_chi_square(),
            n,
        }
    }
}
