//! Plain-text fit summaries.
//!
//! Formatting lives in one place so the fitting code stays clean and the
//! presentation layer can consume a ready-made parameter table without
//! reimplementing the layout.

use crate::fit::FitResult;

/// Format a fixed-width parameter table plus quality diagnostics.
pub fn format_fit_summary(fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("Model: {}\n", fit.model().expr()));
    out.push_str(&format!(
        "Method: {}  (n = {}, dof = {})\n",
        fit.method().display_name(),
        fit.dataset().len(),
        fit.degrees_of_freedom()
    ));
    out.push('\n');

    out.push_str(&format!(
        "{:<12} {:>14} {:>14}\n",
        "parameter", "estimate", "std.error"
    ));
    for name in fit.parameter_names() {
        let estimate = fit.parameter(name).unwrap_or(f64::NAN);
        let se = fit.std_error(name).unwrap_or(f64::NAN);
        out.push_str(&format!("{name:<12} {estimate:>14.6} {se:>14.6}\n"));
    }
    out.push('\n');

    let q = fit.quality();
    out.push_str(&format!("R-squared:          {:>12.6}\n", q.r_squared));
    out.push_str(&format!(
        "Adjusted R-squared: {:>12.6}\n",
        q.adjusted_r_squared
    ));
    out.push_str(&format!(
        "Reduced chi-square: {:>12.6}\n",
        q.reduced_chi_square
    ));
    out.push_str(&format!("RMSE:               {:>12.6}\n", q.rmse));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::{Dataset, FitOptions};
    use crate::fit::fit;
    use crate::model::{Expr, SymbolicModel};

    #[test]
    fn summary_lists_parameters_and_quality() {
        let expr = Expr::var("a") * Expr::var("x") + Expr::var("b");
        let model = SymbolicModel::from_free_symbols(expr, "x").unwrap().shared();
        let data =
            Arc::new(Dataset::from_xy(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap());
        let result = fit(&model, &data, &FitOptions::default()).unwrap();

        let summary = format_fit_summary(&result);
        assert!(summary.contains("OLS"));
        assert!(summary.contains("a "));
        assert!(summary.contains("b "));
        assert!(summary.contains("R-squared"));
        assert!(summary.contains("Reduced chi-square"));
    }
}
