//! Symbolic expression trees.
//!
//! A model is represented as an explicit operator/operand tree supporting:
//!
//! - evaluation against a symbol table (with domain checking)
//! - analytic differentiation (`differentiate` returns a new tree)
//! - constant-folding simplification
//! - substitution of symbols by fitted values (pinning)
//!
//! Evaluation never coerces invalid operations to NaN: log of a
//! non-positive value, division by zero, and the like surface as domain
//! errors so the optimizer can reject the offending step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// A node in a symbolic expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(f64),
    Var(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Exp(Box<Expr>),
    Ln(Box<Expr>),
    Sqrt(Box<Expr>),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
}

impl Expr {
    /// A named symbol.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    /// A numeric constant.
    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn exp(self) -> Self {
        Expr::Exp(self.boxed())
    }

    pub fn ln(self) -> Self {
        Expr::Ln(self.boxed())
    }

    pub fn sqrt(self) -> Self {
        Expr::Sqrt(self.boxed())
    }

    pub fn sin(self) -> Self {
        Expr::Sin(self.boxed())
    }

    pub fn cos(self) -> Self {
        Expr::Cos(self.boxed())
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Pow(self.boxed(), exponent.boxed())
    }

    /// Raise to a constant exponent.
    pub fn powf(self, exponent: f64) -> Self {
        self.pow(Expr::Const(exponent))
    }

    /// Evaluate against a symbol table.
    ///
    /// `lookup` maps a symbol name to its value; an unmapped symbol fails
    /// with an undefined-parameter error.
    pub fn eval<F>(&self, lookup: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Expr::Const(c) => *c,
            Expr::Var(name) => lookup(name)
                .ok_or_else(|| FitError::undefined_parameter(name.clone()))?,
            Expr::Add(l, r) => l.eval(lookup)? + r.eval(lookup)?,
            Expr::Sub(l, r) => l.eval(lookup)? - r.eval(lookup)?,
            Expr::Mul(l, r) => l.eval(lookup)? * r.eval(lookup)?,
            Expr::Div(l, r) => {
                let den = r.eval(lookup)?;
                if den == 0.0 {
                    return Err(FitError::domain("division by zero".to_string()));
                }
                l.eval(lookup)? / den
            }
            Expr::Pow(base, exponent) => {
                let b = base.eval(lookup)?;
                let e = exponent.eval(lookup)?;
                let v = b.powf(e);
                if !v.is_finite() {
                    return Err(FitError::domain(format!(
                        "{b} ^ {e} is outside the real domain"
                    )));
                }
                v
            }
            Expr::Neg(e) => -e.eval(lookup)?,
            Expr::Exp(e) => e.eval(lookup)?.exp(),
            Expr::Ln(e) => {
                let v = e.eval(lookup)?;
                if v <= 0.0 {
                    return Err(FitError::domain(format!("ln of non-positive value {v}")));
                }
                v.ln()
            }
            Expr::Sqrt(e) => {
                let v = e.eval(lookup)?;
                if v < 0.0 {
                    return Err(FitError::domain(format!("sqrt of negative value {v}")));
                }
                v.sqrt()
            }
            Expr::Sin(e) => e.eval(lookup)?.sin(),
            Expr::Cos(e) => e.eval(lookup)?.cos(),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(FitError::domain(format!(
                "expression evaluated to a non-finite value ({value})"
            )))
        }
    }

    /// Analytic partial derivative with respect to `wrt`.
    ///
    /// The returned tree is unsimplified; callers typically chain
    /// [`Expr::simplify`].
    pub fn differentiate(&self, wrt: &str) -> Expr {
        match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Var(name) => {
                if name == wrt {
                    Expr::Const(1.0)
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Add(l, r) => Expr::Add(
                l.differentiate(wrt).boxed(),
                r.differentiate(wrt).boxed(),
            ),
            Expr::Sub(l, r) => Expr::Sub(
                l.differentiate(wrt).boxed(),
                r.differentiate(wrt).boxed(),
            ),
            Expr::Mul(l, r) => {
                // (uv)' = u'v + uv'
                let left = Expr::Mul(l.differentiate(wrt).boxed(), r.clone());
                let right = Expr::Mul(l.clone(), r.differentiate(wrt).boxed());
                Expr::Add(left.boxed(), right.boxed())
            }
            Expr::Div(l, r) => {
                // (u/v)' = (u'v - uv') / v^2
                let num = Expr::Sub(
                    Expr::Mul(l.differentiate(wrt).boxed(), r.clone()).boxed(),
                    Expr::Mul(l.clone(), r.differentiate(wrt).boxed()).boxed(),
                );
                let den = Expr::Mul(r.clone(), r.clone());
                Expr::Div(num.boxed(), den.boxed())
            }
            Expr::Pow(base, exponent) => match exponent.as_ref() {
                // Power rule for constant exponents. This avoids routing
                // x^2 through the ln-based general form, which would
                // spuriously restrict the domain to x > 0.
                Expr::Const(c) => {
                    let inner = Expr::Mul(
                        Expr::Const(*c).boxed(),
                        Expr::Pow(base.clone(), Expr::Const(c - 1.0).boxed()).boxed(),
                    );
                    Expr::Mul(inner.boxed(), base.differentiate(wrt).boxed())
                }
                // General form: (u^v)' = u^v (v' ln u + v u'/u)
                _ => {
                    let term1 = Expr::Mul(
                        exponent.differentiate(wrt).boxed(),
                        Expr::Ln(base.clone()).boxed(),
                    );
                    let term2 = Expr::Div(
                        Expr::Mul(exponent.clone(), base.differentiate(wrt).boxed()).boxed(),
                        base.clone(),
                    );
                    Expr::Mul(
                        self.clone().boxed(),
                        Expr::Add(term1.boxed(), term2.boxed()).boxed(),
                    )
                }
            },
            Expr::Neg(e) => Expr::Neg(e.differentiate(wrt).boxed()),
            Expr::Exp(e) => Expr::Mul(self.clone().boxed(), e.differentiate(wrt).boxed()),
            Expr::Ln(e) => Expr::Div(e.differentiate(wrt).boxed(), e.clone()),
            Expr::Sqrt(e) => {
                // (sqrt u)' = u' / (2 sqrt u)
                let den = Expr::Mul(Expr::Const(2.0).boxed(), self.clone().boxed());
                Expr::Div(e.differentiate(wrt).boxed(), den.boxed())
            }
            Expr::Sin(e) => Expr::Mul(
                Expr::Cos(e.clone()).boxed(),
                e.differentiate(wrt).boxed(),
            ),
            Expr::Cos(e) => Expr::Neg(
                Expr::Mul(Expr::Sin(e.clone()).boxed(), e.differentiate(wrt).boxed()).boxed(),
            ),
        }
    }

    /// Constant-fold and apply algebraic identities.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Var(_) => self.clone(),
            Expr::Add(l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                match (&l, &r) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a + b),
                    (Expr::Const(c), _) if *c == 0.0 => r,
                    (_, Expr::Const(c)) if *c == 0.0 => l,
                    _ => Expr::Add(l.boxed(), r.boxed()),
                }
            }
            Expr::Sub(l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                match (&l, &r) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a - b),
                    (_, Expr::Const(c)) if *c == 0.0 => l,
                    (Expr::Const(c), _) if *c == 0.0 => Expr::Neg(r.boxed()),
                    _ if l == r => Expr::Const(0.0),
                    _ => Expr::Sub(l.boxed(), r.boxed()),
                }
            }
            Expr::Mul(l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                match (&l, &r) {
                    (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b),
                    (Expr::Const(c), _) | (_, Expr::Const(c)) if *c == 0.0 => Expr::Const(0.0),
                    (Expr::Const(c), _) if *c == 1.0 => r,
                    (_, Expr::Const(c)) if *c == 1.0 => l,
                    _ => Expr::Mul(l.boxed(), r.boxed()),
                }
            }
            Expr::Div(l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                match (&l, &r) {
                    (Expr::Const(a), Expr::Const(b)) if *b != 0.0 => Expr::Const(a / b),
                    (Expr::Const(c), _) if *c == 0.0 => Expr::Const(0.0),
                    (_, Expr::Const(c)) if *c == 1.0 => l,
                    _ => Expr::Div(l.boxed(), r.boxed()),
                }
            }
            Expr::Pow(base, exponent) => {
                let base = base.simplify();
                let exponent = exponent.simplify();
                match (&base, &exponent) {
                    (Expr::Const(a), Expr::Const(b)) => {
                        let v = a.powf(*b);
                        if v.is_finite() {
                            Expr::Const(v)
                        } else {
                            Expr::Pow(base.boxed(), exponent.boxed())
                        }
                    }
                    (_, Expr::Const(c)) if *c == 0.0 => Expr::Const(1.0),
                    (_, Expr::Const(c)) if *c == 1.0 => base,
                    (Expr::Const(c), _) if *c == 1.0 => Expr::Const(1.0),
                    _ => Expr::Pow(base.boxed(), exponent.boxed()),
                }
            }
            Expr::Neg(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) => Expr::Const(-c),
                    Expr::Neg(inner) => inner.as_ref().clone(),
                    _ => Expr::Neg(e.boxed()),
                }
            }
            Expr::Exp(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) if *c == 0.0 => Expr::Const(1.0),
                    Expr::Const(c) => Expr::Const(c.exp()),
                    _ => Expr::Exp(e.boxed()),
                }
            }
            Expr::Ln(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) if *c == 1.0 => Expr::Const(0.0),
                    Expr::Const(c) if *c > 0.0 => Expr::Const(c.ln()),
                    _ => Expr::Ln(e.boxed()),
                }
            }
            Expr::Sqrt(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) if *c >= 0.0 => Expr::Const(c.sqrt()),
                    _ => Expr::Sqrt(e.boxed()),
                }
            }
            Expr::Sin(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) => Expr::Const(c.sin()),
                    _ => Expr::Sin(e.boxed()),
                }
            }
            Expr::Cos(e) => {
                let e = e.simplify();
                match &e {
                    Expr::Const(c) => Expr::Const(c.cos()),
                    _ => Expr::Cos(e.boxed()),
                }
            }
        }
    }

    /// Free symbols in first-occurrence (left-to-right) order.
    ///
    /// The order is what downstream reporting uses for parameter tables, so
    /// it must be deterministic and match how the expression was written.
    pub fn free_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Pow(l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
            Expr::Neg(e)
            | Expr::Exp(e)
            | Expr::Ln(e)
            | Expr::Sqrt(e)
            | Expr::Sin(e)
            | Expr::Cos(e) => e.collect_symbols(out),
        }
    }

    /// True if `name` occurs anywhere in the tree.
    pub fn contains_var(&self, name: &str) -> bool {
        self.free_symbols().iter().any(|n| n == name)
    }

    /// Replace each listed symbol by a constant.
    pub fn pin<'a, I>(&self, bindings: I) -> Expr
    where
        I: IntoIterator<Item = (&'a str, f64)> + Clone,
    {
        self.map_vars(&|name| {
            bindings
                .clone()
                .into_iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| Expr::Const(v))
        })
    }

    /// Rename a symbol throughout the tree.
    pub fn rename_var(&self, old: &str, new: &str) -> Expr {
        self.map_vars(&|name| {
            if name == old {
                Some(Expr::Var(new.to_string()))
            } else {
                None
            }
        })
    }

    fn map_vars<F>(&self, replace: &F) -> Expr
    where
        F: Fn(&str) -> Option<Expr>,
    {
        match self {
            Expr::Const(_) => self.clone(),
            Expr::Var(name) => replace(name).unwrap_or_else(|| self.clone()),
            Expr::Add(l, r) => Expr::Add(l.map_vars(replace).boxed(), r.map_vars(replace).boxed()),
            Expr::Sub(l, r) => Expr::Sub(l.map_vars(replace).boxed(), r.map_vars(replace).boxed()),
            Expr::Mul(l, r) => Expr::Mul(l.map_vars(replace).boxed(), r.map_vars(replace).boxed()),
            Expr::Div(l, r) => Expr::Div(l.map_vars(replace).boxed(), r.map_vars(replace).boxed()),
            Expr::Pow(l, r) => Expr::Pow(l.map_vars(replace).boxed(), r.map_vars(replace).boxed()),
            Expr::Neg(e) => Expr::Neg(e.map_vars(replace).boxed()),
            Expr::Exp(e) => Expr::Exp(e.map_vars(replace).boxed()),
            Expr::Ln(e) => Expr::Ln(e.map_vars(replace).boxed()),
            Expr::Sqrt(e) => Expr::Sqrt(e.map_vars(replace).boxed()),
            Expr::Sin(e) => Expr::Sin(e.map_vars(replace).boxed()),
            Expr::Cos(e) => Expr::Cos(e.map_vars(replace).boxed()),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::Sub(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::Div(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(self.boxed())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Add(l, r) => write!(f, "({l} + {r})"),
            Expr::Sub(l, r) => write!(f, "({l} - {r})"),
            Expr::Mul(l, r) => write!(f, "({l} * {r})"),
            Expr::Div(l, r) => write!(f, "({l} / {r})"),
            Expr::Pow(l, r) => write!(f, "({l} ^ {r})"),
            Expr::Neg(e) => write!(f, "(-{e})"),
            Expr::Exp(e) => write!(f, "exp({e})"),
            Expr::Ln(e) => write!(f, "ln({e})"),
            Expr::Sqrt(e) => write!(f, "sqrt({e})"),
            Expr::Sin(e) => write!(f, "sin({e})"),
            Expr::Cos(e) => write!(f, "cos({e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_at(expr: &Expr, x: f64) -> f64 {
        expr.eval(&|name| if name == "x" { Some(x) } else { None })
            .unwrap()
    }

    /// Central finite difference for cross-checking analytic derivatives.
    fn numeric_derivative(expr: &Expr, x: f64) -> f64 {
        let h = 1e-6;
        (eval_at(expr, x + h) - eval_at(expr, x - h)) / (2.0 * h)
    }

    #[test]
    fn eval_basic_arithmetic() {
        let e = Expr::var("x") * Expr::constant(3.0) + Expr::constant(1.0);
        assert_eq!(eval_at(&e, 2.0), 7.0);
    }

    #[test]
    fn eval_missing_symbol_is_undefined_parameter() {
        let e = Expr::var("a") + Expr::var("x");
        let err = e
            .eval(&|name| if name == "x" { Some(1.0) } else { None })
            .unwrap_err();
        assert_eq!(err, FitError::undefined_parameter("a"));
    }

    #[test]
    fn eval_ln_of_negative_is_domain_error() {
        let e = Expr::var("x").ln();
        let err = e.eval(&|_| Some(-2.0)).unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn eval_division_by_zero_is_domain_error() {
        let e = Expr::constant(1.0) / Expr::var("x");
        assert!(e.eval(&|_| Some(0.0)).unwrap_err().is_domain());
    }

    #[test]
    fn eval_fractional_power_of_negative_is_domain_error() {
        let e = Expr::var("x").powf(0.5);
        assert!(e.eval(&|_| Some(-4.0)).unwrap_err().is_domain());
    }

    #[test]
    fn derivative_of_power_matches_numeric() {
        let e = Expr::var("x").powf(3.0);
        let d = e.differentiate("x").simplify();
        for &x in &[-2.0, 0.5, 1.7] {
            assert!((eval_at(&d, x) - numeric_derivative(&e, x)).abs() < 1e-5);
        }
    }

    #[test]
    fn derivative_of_negative_base_power_stays_real() {
        // x^2 at x < 0 must not route through ln(x).
        let e = Expr::var("x").powf(2.0);
        let d = e.differentiate("x").simplify();
        assert!((eval_at(&d, -3.0) - (-6.0)).abs() < 1e-12);
    }

    #[test]
    fn derivative_of_exp_product_matches_numeric() {
        // d/dx [exp(2x) * x] checked numerically.
        let e = (Expr::constant(2.0) * Expr::var("x")).exp() * Expr::var("x");
        let d = e.differentiate("x").simplify();
        for &x in &[0.0, 0.3, 1.1] {
            assert!((eval_at(&d, x) - numeric_derivative(&e, x)).abs() < 1e-4);
        }
    }

    #[test]
    fn derivative_of_trig_matches_numeric() {
        let e = Expr::var("x").sin() * Expr::var("x").cos();
        let d = e.differentiate("x").simplify();
        for &x in &[0.0, 1.0, 2.5] {
            assert!((eval_at(&d, x) - numeric_derivative(&e, x)).abs() < 1e-5);
        }
    }

    #[test]
    fn derivative_wrt_other_symbol_is_zero() {
        let e = Expr::var("x").powf(2.0);
        assert_eq!(e.differentiate("a").simplify(), Expr::Const(0.0));
    }

    #[test]
    fn simplify_folds_identities() {
        let zero = Expr::constant(0.0);
        let e = (Expr::var("x") * Expr::constant(1.0)) + zero;
        assert_eq!(e.simplify(), Expr::var("x"));

        let e = Expr::var("x") * Expr::constant(0.0);
        assert_eq!(e.simplify(), Expr::Const(0.0));

        let e = Expr::var("x") - Expr::var("x");
        assert_eq!(e.simplify(), Expr::Const(0.0));
    }

    #[test]
    fn free_symbols_preserve_first_occurrence_order() {
        let e = Expr::var("a") * Expr::var("x") + Expr::var("b") + Expr::var("a");
        assert_eq!(e.free_symbols(), vec!["a", "x", "b"]);
    }

    #[test]
    fn pin_substitutes_constants() {
        let e = Expr::var("a") * Expr::var("x");
        let pinned = e.pin([("a", 2.0)]).simplify();
        assert_eq!(eval_at(&pinned, 3.0), 6.0);
        assert_eq!(pinned.free_symbols(), vec!["x"]);
    }

    #[test]
    fn rename_var_rewrites_symbol() {
        let e = Expr::var("t") + Expr::constant(1.0);
        let renamed = e.rename_var("t", "x");
        assert_eq!(eval_at(&renamed, 4.0), 5.0);
    }

    #[test]
    fn display_is_parenthesized() {
        let e = Expr::var("a") * Expr::var("x") + Expr::var("b");
        assert_eq!(format!("{e}"), "((a * x) + b)");
    }
}
