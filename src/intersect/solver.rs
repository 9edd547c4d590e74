//! Intersections between two fitted curves.
//!
//! The difference curve `d(x) = A(x) − B(x)` is built symbolically: each
//! model's expression is pinned at its fitted parameter values, B's
//! variable is renamed to A's, and the trees are subtracted. Root location
//! then works on `d` and its analytic derivative.
//!
//! The search window defaults to the overlap of the two observed x-ranges;
//! a caller-supplied window must stay inside the union of the observed
//! ranges, since anything beyond it would be an unverifiable extrapolation.
//!
//! Contact classification:
//! - sign change in `d` with a clear slope at the root → `Crossing`
//! - `d` touching zero with `d′` within tolerance → `Tangency`
//! - `d ≡ 0` over the whole window (e.g. intersecting a fit with itself)
//!   → degenerate result with no points
//!
//! Uncertainty on a crossing is propagated through the implicit-function
//! derivative: `var(x*) = [d′(x*)]⁻² · (gᵀA·CovA·gA + gᵀB·CovB·gB)`, the
//! two fits being independent. At a tangency the formula degenerates, so
//! no standard error is reported there.

use tracing::debug;

use crate::domain::IntersectOptions;
use crate::error::{FitError, Result};
use crate::fit::FitResult;
use crate::math::{brackets_from_samples, refine_root, sample_grid, Bracket};
use crate::model::Expr;

/// How two curves touch at a reported point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// The difference changes sign with a usable slope.
    Crossing,
    /// The difference touches zero without a usable slope.
    Tangency,
}

/// One intersection point.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub x: f64,
    pub y: f64,
    /// Propagated standard error on x; absent at tangencies, where the
    /// implicit-function propagation is undefined.
    pub x_std_error: Option<f64>,
    pub kind: ContactKind,
}

/// All intersections found in the search window, ordered by x.
///
/// An empty `points` with `degenerate = false` means the curves simply do
/// not cross in range; `degenerate = true` means they coincide everywhere
/// in the window.
#[derive(Debug, Clone)]
pub struct IntersectionResult {
    pub points: Vec<Intersection>,
    pub degenerate: bool,
    /// The window that was actually searched.
    pub window: (f64, f64),
}

/// Iteration cap for root refinement.
const REFINE_MAX_ITERATIONS: usize = 200;
/// Relative amplitude below which the difference counts as identically zero.
const DEGENERATE_EPS: f64 = 1e-12;

/// Find the x-values where two fitted curves are equal.
pub fn intersections(
    a: &FitResult,
    b: &FitResult,
    options: &IntersectOptions,
) -> Result<IntersectionResult> {
    let window = resolve_window(a, b, options)?;
    let (lo, hi) = window;
    let var = a.model().var_name().to_string();

    // Pin both curves and build the symbolic difference.
    let a_expr = a.model().pinned_expr(a.parameters())?;
    let mut b_expr = b.model().pinned_expr(b.parameters())?;
    if b.model().var_name() != var {
        b_expr = b_expr.rename_var(b.model().var_name(), &var);
    }
    let d = (a_expr - b_expr).simplify();
    let dp = d.differentiate(&var).simplify();

    let d_at = |x: f64| eval_single(&d, &var, x);
    let dp_at = |x: f64| eval_single(&dp, &var, x);

    let samples = sample_grid(&d_at, lo, hi, options.scan_points)?;

    // Scale references for the zero/degeneracy tests come from curve A's
    // own magnitude over the window, so tolerances track the data units.
    let y_scale = {
        let mut m = 0.0_f64;
        for &(x, _) in &samples {
            m = m.max(a.predict(x)?.abs());
        }
        1.0 + m
    };
    let amplitude = samples.iter().map(|&(_, v)| v.abs()).fold(0.0, f64::max);

    if amplitude <= DEGENERATE_EPS * y_scale {
        debug!(lo, hi, "difference curve is identically zero in window");
        return Ok(IntersectionResult {
            points: Vec::new(),
            degenerate: true,
            window,
        });
    }

    let slope_scale = amplitude / (hi - lo);
    let slope_tol = options.tangency_tolerance * (1.0 + slope_scale);
    let value_tol = options.tangency_tolerance * y_scale;

    let mut raw: Vec<(f64, f64, ContactKind)> = Vec::new();

    // True sign changes.
    for bracket in brackets_from_samples(&samples) {
        let x_star = refine_root(
            &d_at,
            Some(&dp_at),
            bracket,
            options.root_tolerance,
            REFINE_MAX_ITERATIONS,
        )?;
        let slope = dp_at(x_star)?;
        let kind = if slope.abs() <= slope_tol {
            ContactKind::Tangency
        } else {
            ContactKind::Crossing
        };
        raw.push((x_star, slope, kind));
    }

    // Touch points: local minima of |d| that reach zero without a sign
    // change never produce a bracket, so they are hunted separately via
    // the stationary points of d.
    for w in samples.windows(3) {
        let (x0, f0) = w[0];
        let (x1, f1) = w[1];
        let (x2, f2) = w[2];
        let same_sign = f0 * f2 > 0.0 && f0 * f1 > 0.0;
        if !(same_sign && f1.abs() <= f0.abs() && f1.abs() <= f2.abs()) {
            continue;
        }
        let s0 = dp_at(x0)?;
        let s2 = dp_at(x2)?;
        let x_m = if s0 * s2 < 0.0 {
            refine_root(
                &dp_at,
                None::<&fn(f64) -> Result<f64>>,
                Bracket { lo: x0, hi: x2 },
                options.root_tolerance,
                REFINE_MAX_ITERATIONS,
            )?
        } else {
            x1
        };
        if d_at(x_m)?.abs() <= value_tol {
            raw.push((x_m, dp_at(x_m)?, ContactKind::Tangency));
        }
    }

    raw.sort_by(|p, q| p.0.total_cmp(&q.0));

    // Collapse duplicates and recombine tangencies that fit rounding split
    // into two sign changes: a pair of opposite-slope crossings straddling
    // a near-zero dip is one tangential contact, not two crossings.
    let close_tol = (hi - lo) * 1e-9 + options.root_tolerance;
    let merge_tol = (hi - lo) * 1e-6;
    let mut i = 1;
    while i < raw.len() {
        let (x_prev, s_prev, k_prev) = raw[i - 1];
        let (x_cur, s_cur, k_cur) = raw[i];
        let dx = x_cur - x_prev;
        if dx <= close_tol {
            // Same abscissa found twice; prefer the crossing tag.
            if k_prev == ContactKind::Tangency && k_cur == ContactKind::Crossing {
                raw.remove(i - 1);
            } else {
                raw.remove(i);
            }
        } else if dx <= merge_tol
            && k_prev == ContactKind::Crossing
            && k_cur == ContactKind::Crossing
            && s_prev * s_cur < 0.0
            && d_at(0.5 * (x_prev + x_cur))?.abs() <= value_tol
        {
            let mid = 0.5 * (x_prev + x_cur);
            raw[i - 1] = (mid, dp_at(mid)?, ContactKind::Tangency);
            raw.remove(i);
        } else {
            i += 1;
        }
    }

    let mut points = Vec::with_capacity(raw.len());
    for (x_star, slope, kind) in raw {
        points.push(build_point(a, b, x_star, slope, kind)?);
    }

    Ok(IntersectionResult {
        points,
        degenerate: false,
        window,
    })
}

fn resolve_window(
    a: &FitResult,
    b: &FitResult,
    options: &IntersectOptions,
) -> Result<(f64, f64)> {
    let (a_lo, a_hi) = a.x_range();
    let (b_lo, b_hi) = b.x_range();
    let union = (a_lo.min(b_lo), a_hi.max(b_hi));

    match options.window {
        Some((lo, hi)) => {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(FitError::domain(format!(
                    "invalid intersection window [{lo}, {hi}]"
                )));
            }
            if lo < union.0 || hi > union.1 {
                return Err(FitError::domain(format!(
                    "window [{lo}, {hi}] extrapolates beyond the observed ranges \
                     [{}, {}]",
                    union.0, union.1
                )));
            }
            Ok((lo, hi))
        }
        None => {
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo >= hi {
                return Err(FitError::domain(format!(
                    "observed x-ranges [{a_lo}, {a_hi}] and [{b_lo}, {b_hi}] do not overlap"
                )));
            }
            Ok((lo, hi))
        }
    }
}

fn eval_single(expr: &Expr, var: &str, x: f64) -> Result<f64> {
    expr.eval(&|name| (name == var).then_some(x))
}

fn build_point(
    a: &FitResult,
    b: &FitResult,
    x_star: f64,
    slope: f64,
    kind: ContactKind,
) -> Result<Intersection> {
    let x_std_error = match kind {
        ContactKind::Tangency => None,
        ContactKind::Crossing => {
            let ga = a.model().gradient(x_star, a.parameters())?;
            let gb = b.model().gradient(x_star, b.parameters())?;
            // Block-diagonal combined covariance: the fits are independent,
            // so the quadratic form splits into two terms.
            let var_d = ga.dot(&(a.covariance() * &ga)) + gb.dot(&(b.covariance() * &gb));
            Some((var_d / (slope * slope)).sqrt())
        }
    };
    Ok(Intersection {
        x: x_star,
        y: a.predict(x_star)?,
        x_std_error,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::{Dataset, FitOptions};
    use crate::fit::fit;
    use crate::model::SymbolicModel;

    fn fit_line(slope: f64, intercept: f64, xs: &[f64]) -> FitResult {
        let expr = Expr::var("a") * Expr::var("x") + Expr::var("b");
        let model = SymbolicModel::from_free_symbols(expr, "x").unwrap().shared();
        let ys: Vec<f64> = xs.iter().map(|x| slope * x + intercept).collect();
        let data = Arc::new(Dataset::from_xy(xs, &ys).unwrap());
        fit(&model, &data, &FitOptions::default()).unwrap()
    }

    fn fit_quadratic(xs: &[f64], f: impl Fn(f64) -> f64) -> FitResult {
        let expr = Expr::var("a") * Expr::var("x").powf(2.0)
            + Expr::var("b") * Expr::var("x")
            + Expr::var("c");
        let model = SymbolicModel::from_free_symbols(expr, "x").unwrap().shared();
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        let data = Arc::new(Dataset::from_xy(xs, &ys).unwrap());
        fit(&model, &data, &FitOptions::default()).unwrap()
    }

    fn grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn crossing_lines_meet_at_expected_point() {
        // y = x and y = -x + 4 cross at (2, 2).
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(1.0, 0.0, &xs);
        let b = fit_line(-1.0, 4.0, &xs);
        let result = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        assert!(!result.degenerate);
        assert_eq!(result.points.len(), 1);
        let p = &result.points[0];
        assert_eq!(p.kind, ContactKind::Crossing);
        assert!((p.x - 2.0).abs() < 1e-8, "x = {}", p.x);
        assert!((p.y - 2.0).abs() < 1e-8, "y = {}", p.y);
        let se = p.x_std_error.unwrap();
        assert!(se.is_finite());
    }

    #[test]
    fn identical_fits_are_degenerate() {
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(2.0, 1.0, &xs);
        let b = fit_line(2.0, 1.0, &xs);
        let result = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        assert!(result.degenerate);
        assert!(result.points.is_empty());
    }

    #[test]
    fn parallel_lines_return_empty_result() {
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(1.0, 0.0, &xs);
        let b = fit_line(1.0, 3.0, &xs);
        let result = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        assert!(!result.degenerate);
        assert!(result.points.is_empty());
    }

    #[test]
    fn quadratic_crosses_line_twice() {
        let xs = grid(-4.0, 4.0, 17);
        // x^2 - 4 vs 0: roots at ±2.
        let a = fit_quadratic(&xs, |x| x * x - 4.0);
        let b = fit_line(0.0, 0.0, &xs);
        let result = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        assert_eq!(result.points.len(), 2);
        assert!((result.points[0].x + 2.0).abs() < 1e-7);
        assert!((result.points[1].x - 2.0).abs() < 1e-7);
        assert!(result.points[0].x < result.points[1].x);
    }

    #[test]
    fn tangent_touch_is_tagged_not_crossed() {
        let xs = grid(0.0, 4.0, 17);
        // (x-2)^2 touches the zero line at x = 2.
        let a = fit_quadratic(&xs, |x| (x - 2.0) * (x - 2.0));
        let b = fit_line(0.0, 0.0, &xs);
        let result = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        assert_eq!(result.points.len(), 1);
        let p = &result.points[0];
        assert_eq!(p.kind, ContactKind::Tangency);
        assert!((p.x - 2.0).abs() < 1e-6, "x = {}", p.x);
        assert!(p.x_std_error.is_none());
    }

    #[test]
    fn disjoint_ranges_are_a_domain_error() {
        let a = fit_line(1.0, 0.0, &grid(0.0, 2.0, 5));
        let b = fit_line(1.0, 0.0, &grid(5.0, 8.0, 5));
        let err = intersections(&a, &b, &IntersectOptions::default()).unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn window_beyond_union_is_rejected() {
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(1.0, 0.0, &xs);
        let b = fit_line(-1.0, 4.0, &xs);
        let options = IntersectOptions {
            window: Some((-10.0, 20.0)),
            ..IntersectOptions::default()
        };
        assert!(intersections(&a, &b, &options).unwrap_err().is_domain());
    }

    #[test]
    fn window_inside_union_can_exclude_the_crossing() {
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(1.0, 0.0, &xs);
        let b = fit_line(-1.0, 4.0, &xs);
        let options = IntersectOptions {
            window: Some((3.0, 5.0)),
            ..IntersectOptions::default()
        };
        let result = intersections(&a, &b, &options).unwrap();
        assert!(result.points.is_empty());
        assert!(!result.degenerate);
    }

    #[test]
    fn order_of_arguments_does_not_change_the_abscissa() {
        let xs = grid(0.0, 5.0, 11);
        let a = fit_line(1.0, 0.0, &xs);
        let b = fit_line(-1.0, 4.0, &xs);
        let ab = intersections(&a, &b, &IntersectOptions::default()).unwrap();
        let ba = intersections(&b, &a, &IntersectOptions::default()).unwrap();
        assert!((ab.points[0].x - ba.points[0].x).abs() < 1e-9);
    }
}
