//! A fittable symbolic model over one independent variable.
//!
//! `SymbolicModel` binds an expression tree to an ordered parameter list
//! and the name of the independent variable. Derivative trees (one per
//! parameter, plus the partial with respect to the variable) are derived
//! symbolically on first use and cached for the lifetime of the model.
//! The model is immutable after construction, so the caches are read-only
//! once populated and the model can be shared across concurrent fits.

use std::sync::{Arc, OnceLock};

use nalgebra::DVector;

use crate::error::{FitError, Result};
use crate::model::expr::Expr;

/// An immutable symbolic model `y = f(x; params)`.
#[derive(Debug)]
pub struct SymbolicModel {
    expr: Expr,
    var: String,
    params: Vec<String>,
    d_dx: OnceLock<Expr>,
    d_dparams: OnceLock<Vec<Expr>>,
}

impl SymbolicModel {
    /// Wrap an expression with an explicit parameter order.
    ///
    /// Validates that parameter names are unique, that at least one
    /// parameter exists, and that every free symbol of the expression is
    /// either the independent variable or a declared parameter. A declared
    /// parameter that never occurs in the expression is accepted here; it
    /// surfaces later as a singular Jacobian (an identifiability problem,
    /// not a construction error).
    pub fn new(expr: Expr, var: impl Into<String>, params: Vec<String>) -> Result<Self> {
        let var = var.into();
        if params.is_empty() {
            return Err(FitError::domain(
                "model must have at least one free parameter".to_string(),
            ));
        }
        if params.iter().any(|p| *p == var) {
            return Err(FitError::domain(format!(
                "`{var}` cannot be both the independent variable and a parameter"
            )));
        }
        for (i, name) in params.iter().enumerate() {
            if params[..i].contains(name) {
                return Err(FitError::domain(format!(
                    "duplicate parameter name `{name}`"
                )));
            }
        }
        for symbol in expr.free_symbols() {
            if symbol != var && !params.contains(&symbol) {
                return Err(FitError::undefined_parameter(symbol));
            }
        }
        if !expr.contains_var(&var) {
            return Err(FitError::domain(format!(
                "expression does not contain the independent variable `{var}`"
            )));
        }
        Ok(Self {
            expr,
            var,
            params,
            d_dx: OnceLock::new(),
            d_dparams: OnceLock::new(),
        })
    }

    /// Wrap an expression, taking every free symbol except `var` as a
    /// parameter, in first-occurrence order.
    ///
    /// This is the landing point for a formula parser front-end: the parser
    /// yields the tree and the variable name, and the parameter set is
    /// derived by introspection.
    pub fn from_free_symbols(expr: Expr, var: impl Into<String>) -> Result<Self> {
        let var = var.into();
        let params: Vec<String> = expr
            .free_symbols()
            .into_iter()
            .filter(|s| *s != var)
            .collect();
        Self::new(expr, var, params)
    }

    /// Convenience: wrap in `Arc` for sharing across fits.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Name of the independent variable.
    pub fn var_name(&self) -> &str {
        &self.var
    }

    /// Parameter names in declaration order (used for reporting).
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// Index of a parameter by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    fn check_param_len(&self, values: &[f64]) -> Result<()> {
        if values.len() == self.params.len() {
            return Ok(());
        }
        // Report the first parameter with no corresponding value, or a
        // generic mismatch when too many values were supplied.
        match self.params.get(values.len()) {
            Some(missing) => Err(FitError::undefined_parameter(missing.clone())),
            None => Err(FitError::domain(format!(
                "expected {} parameter values, got {}",
                self.params.len(),
                values.len()
            ))),
        }
    }

    fn lookup<'a>(&'a self, x: f64, values: &'a [f64]) -> impl Fn(&str) -> Option<f64> + 'a {
        move |name: &str| {
            if name == self.var {
                Some(x)
            } else {
                self.param_index(name).map(|i| values[i])
            }
        }
    }

    /// Evaluate `f(x; params)`.
    pub fn evaluate(&self, x: f64, values: &[f64]) -> Result<f64> {
        self.check_param_len(values)?;
        self.expr.eval(&self.lookup(x, values))
    }

    /// Evaluate over an ordered sequence of x-values without re-deriving
    /// anything.
    pub fn evaluate_many(&self, xs: &[f64], values: &[f64]) -> Result<Vec<f64>> {
        self.check_param_len(values)?;
        xs.iter()
            .map(|&x| self.expr.eval(&self.lookup(x, values)))
            .collect()
    }

    /// Analytic gradient `[df/dparam_0, ..., df/dparam_{p-1}]` at `x`.
    pub fn gradient(&self, x: f64, values: &[f64]) -> Result<DVector<f64>> {
        self.check_param_len(values)?;
        let trees = self.gradient_trees();
        let lookup = self.lookup(x, values);
        let mut out = DVector::zeros(trees.len());
        for (i, tree) in trees.iter().enumerate() {
            out[i] = tree.eval(&lookup)?;
        }
        Ok(out)
    }

    /// Analytic partial derivative with respect to the independent variable.
    pub fn partial_wrt_x(&self, x: f64, values: &[f64]) -> Result<f64> {
        self.check_param_len(values)?;
        self.dx_tree().eval(&self.lookup(x, values))
    }

    /// Pin every parameter to a fitted value, leaving a single-variable
    /// expression. Used by the intersection solver.
    pub fn pinned_expr(&self, values: &[f64]) -> Result<Expr> {
        self.check_param_len(values)?;
        let bindings = self
            .params
            .iter()
            .map(|s| s.as_str())
            .zip(values.iter().copied());
        Ok(self.expr.pin(bindings).simplify())
    }

    /// Derivative trees per parameter, derived once and cached.
    fn gradient_trees(&self) -> &[Expr] {
        self.d_dparams.get_or_init(|| {
            self.params
                .iter()
                .map(|p| self.expr.differentiate(p).simplify())
                .collect()
        })
    }

    /// Derivative tree with respect to the independent variable.
    fn dx_tree(&self) -> &Expr {
        self.d_dx
            .get_or_init(|| self.expr.differentiate(&self.var).simplify())
    }
}
