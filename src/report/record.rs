//! Portable fit records.
//!
//! `FitRecord` is the serialized representation of a completed fit:
//! formula rendering, parameter table, covariance, method, and quality
//! diagnostics. Field order is stable for reproducibility — records
//! written by one run diff cleanly against records written by another.

use serde::{Deserialize, Serialize};

use crate::domain::{FitMethod, FitQuality};
use crate::error::{FitError, Result};
use crate::fit::FitResult;

/// Serialized snapshot of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    /// Rendered model expression.
    pub formula: String,
    /// Name of the independent variable.
    pub independent_variable: String,
    pub method: FitMethod,
    /// Parameter names, in model declaration order.
    pub parameter_names: Vec<String>,
    /// Fitted values, aligned with `parameter_names`.
    pub parameter_values: Vec<f64>,
    /// Covariance matrix, row-major, aligned with `parameter_names`.
    pub covariance: Vec<Vec<f64>>,
    pub degrees_of_freedom: usize,
    pub n_points: usize,
    pub quality: FitQuality,
}

impl FitRecord {
    /// Snapshot a completed fit.
    pub fn from_fit(fit: &FitResult) -> Self {
        let p = fit.parameters().len();
        let covariance = (0..p)
            .map(|i| (0..p).map(|j| fit.covariance()[(i, j)]).collect())
            .collect();
        Self {
            formula: fit.model().expr().to_string(),
            independent_variable: fit.model().var_name().to_string(),
            method: fit.method(),
            parameter_names: fit.parameter_names().to_vec(),
            parameter_values: fit.parameters().to_vec(),
            covariance,
            degrees_of_freedom: fit.degrees_of_freedom(),
            n_points: fit.dataset().len(),
            quality: fit.quality(),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FitError::domain(format!("failed to serialize fit record: {e}")))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FitError::domain(format!("invalid fit record JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::{Dataset, FitOptions};
    use crate::fit::fit;
    use crate::model::{Expr, SymbolicModel};

    fn sample_record() -> FitRecord {
        let expr = Expr::var("a") * Expr::var("x") + Expr::var("b");
        let model = SymbolicModel::from_free_symbols(expr, "x").unwrap().shared();
        let data =
            Arc::new(Dataset::from_xy(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap());
        let result = fit(&model, &data, &FitOptions::default()).unwrap();
        FitRecord::from_fit(&result)
    }

    #[test]
    fn record_mirrors_the_fit() {
        let record = sample_record();
        assert_eq!(record.parameter_names, vec!["a", "b"]);
        assert_eq!(record.independent_variable, "x");
        assert_eq!(record.n_points, 4);
        assert_eq!(record.degrees_of_freedom, 2);
        assert_eq!(record.covariance.len(), 2);
        assert_eq!(record.covariance[0].len(), 2);
        assert!((record.parameter_values[0] - 2.0).abs() < 1e-8);
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let record = sample_record();
        let json = record.to_json().unwrap();
        let back = FitRecord::from_json(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn json_field_order_is_stable() {
        let json = sample_record().to_json().unwrap();
        let formula_at = json.find("\"formula\"").unwrap();
        let method_at = json.find("\"method\"").unwrap();
        let quality_at = json.find("\"quality\"").unwrap();
        assert!(formula_at < method_at && method_at < quality_at);
    }

    #[test]
    fn malformed_json_is_a_domain_error() {
        assert!(FitRecord::from_json("{").unwrap_err().is_domain());
    }
}
