//! One-dimensional root location for the intersection solver.
//!
//! Strategy: sample the function on a grid, bracket sign changes, then
//! refine each bracket with a safeguarded Newton iteration that falls back
//! to bisection whenever the Newton step leaves the bracket or the slope
//! is unusable. The bracket guarantees progress; Newton provides the final
//! convergence rate.

use crate::error::{FitError, Result};

/// A sign-change bracket `[lo, hi]` with `f(lo) * f(hi) < 0`.
#[derive(Debug, Clone, Copy)]
pub struct Bracket {
    pub lo: f64,
    pub hi: f64,
}

/// Evaluate `f` on `n + 1` evenly spaced points over `[lo, hi]`.
pub fn sample_grid<F>(f: &F, lo: f64, hi: f64, n: usize) -> Result<Vec<(f64, f64)>>
where
    F: Fn(f64) -> Result<f64>,
{
    let n = n.max(2);
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let u = i as f64 / n as f64;
        let x = lo + u * (hi - lo);
        out.push((x, f(x)?));
    }
    Ok(out)
}

/// Brackets around every sign change in a sampled grid.
pub fn brackets_from_samples(samples: &[(f64, f64)]) -> Vec<Bracket> {
    let mut out = Vec::new();
    for pair in samples.windows(2) {
        let (x0, f0) = pair[0];
        let (x1, f1) = pair[1];
        if f0 == 0.0 {
            // Exact zero at a grid node; the refinement step will land on
            // it from a degenerate bracket.
            out.push(Bracket { lo: x0, hi: x0 });
        } else if f0 * f1 < 0.0 {
            out.push(Bracket { lo: x0, hi: x1 });
        }
    }
    // Trailing grid node hitting zero exactly.
    if let Some(&(x, f)) = samples.last() {
        if f == 0.0 {
            out.push(Bracket { lo: x, hi: x });
        }
    }
    out
}

/// Refine a root inside a bracket.
///
/// `df` is the analytic derivative when available; without it the
/// refinement is plain bisection. Hitting the iteration cap fails with a
/// convergence error carrying the last abscissa and residual.
pub fn refine_root<F, D>(
    f: &F,
    df: Option<&D>,
    bracket: Bracket,
    tol: f64,
    max_iterations: usize,
) -> Result<f64>
where
    F: Fn(f64) -> Result<f64>,
    D: Fn(f64) -> Result<f64>,
{
    let (mut a, mut b) = (bracket.lo, bracket.hi);
    if a == b {
        return Ok(a);
    }

    let mut fa = f(a)?;
    if fa == 0.0 {
        return Ok(a);
    }

    let mut x = 0.5 * (a + b);
    let mut fx = f(x)?;

    for iteration in 1..=max_iterations {
        if fx == 0.0 || (b - a).abs() <= tol * (1.0 + x.abs()) {
            return Ok(x);
        }

        // Maintain the sign-change invariant.
        if fa * fx < 0.0 {
            b = x;
        } else {
            a = x;
            fa = fx;
        }

        // Newton step if it stays strictly inside the bracket, else bisect.
        let mut next = 0.5 * (a + b);
        if let Some(df) = df {
            if let Ok(slope) = df(x) {
                if slope != 0.0 && slope.is_finite() {
                    let candidate = x - fx / slope;
                    if candidate > a && candidate < b {
                        next = candidate;
                    }
                }
            }
        }

        x = next;
        fx = f(x)?;

        if iteration == max_iterations {
            return Err(FitError::convergence(iteration, fx.abs(), vec![x]));
        }
    }

    Err(FitError::convergence(max_iterations, fx.abs(), vec![x]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_root() {
        let f = |x: f64| Ok(x * x - 4.0);
        let df = |x: f64| Ok(2.0 * x);
        let samples = sample_grid(&f, 0.0, 5.0, 32).unwrap();
        let brackets = brackets_from_samples(&samples);
        assert_eq!(brackets.len(), 1);
        let root = refine_root(&f, Some(&df), brackets[0], 1e-12, 100).unwrap();
        assert!((root - 2.0).abs() < 1e-10);
    }

    #[test]
    fn finds_multiple_roots() {
        // sin has roots at 0, pi, 2pi in [−1, 7].
        let f = |x: f64| Ok(x.sin());
        let samples = sample_grid(&f, -1.0, 7.0, 64).unwrap();
        let brackets = brackets_from_samples(&samples);
        assert_eq!(brackets.len(), 3);
    }

    #[test]
    fn bisection_only_still_converges() {
        let f = |x: f64| Ok(x.exp() - 3.0);
        let samples = sample_grid(&f, 0.0, 2.0, 8).unwrap();
        let brackets = brackets_from_samples(&samples);
        let root =
            refine_root(&f, None::<&fn(f64) -> Result<f64>>, brackets[0], 1e-10, 200).unwrap();
        assert!((root - 3.0_f64.ln()).abs() < 1e-8);
    }

    #[test]
    fn exact_grid_zero_is_degenerate_bracket() {
        let f = |x: f64| Ok(x);
        let samples = sample_grid(&f, -1.0, 1.0, 2).unwrap();
        let brackets = brackets_from_samples(&samples);
        assert_eq!(brackets.len(), 1);
        assert_eq!(brackets[0].lo, brackets[0].hi);
    }

    #[test]
    fn no_sign_change_no_brackets() {
        let f = |x: f64| Ok(x * x + 1.0);
        let samples = sample_grid(&f, -2.0, 2.0, 16).unwrap();
        assert!(brackets_from_samples(&samples).is_empty());
    }
}
