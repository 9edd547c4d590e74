//! Error taxonomy for fitting, intersection, and inference.
//!
//! Every failure carries enough state to retry meaningfully: convergence
//! failures report the iteration count, last residual norm, and the last
//! parameter estimate; undefined-parameter failures name the offending
//! symbol. Errors are raised at the boundary of the operation that detects
//! them and are never downgraded to default values.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FitError>;

/// Errors that can occur during model evaluation, fitting, intersection
/// search, or statistical inference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// A symbol was referenced during evaluation without an assigned value.
    #[error("parameter `{name}` has no assigned value")]
    UndefinedParameter {
        /// Name of the offending parameter.
        name: String,
    },

    /// Evaluation left the valid numeric domain (log of a non-positive
    /// value, division by zero, ...) or a requested window lies outside
    /// the observed data ranges.
    #[error("domain error: {message}")]
    Domain {
        /// Human-readable description including the offending value.
        message: String,
    },

    /// The iterative solver hit its iteration cap before the tolerance was
    /// satisfied. The last estimate is retained so callers can retry with
    /// a different guess or method.
    #[error(
        "failed to converge after {iterations} iterations (residual norm {residual_norm:.6e})"
    )]
    Convergence {
        /// Iterations performed before giving up.
        iterations: usize,
        /// Weighted residual norm at the last accepted estimate.
        residual_norm: f64,
        /// Last parameter estimate, in model parameter order.
        last_estimate: Vec<f64>,
    },

    /// The Jacobian became numerically rank-deficient, which flags an
    /// identifiability problem in the model/parameter set.
    #[error("singular Jacobian: rank {rank} of {expected} (unidentifiable parameter?)")]
    SingularJacobian {
        /// Numerical rank detected.
        rank: usize,
        /// Expected rank (the number of free parameters).
        expected: usize,
    },

    /// Fewer data points than the fit requires. Detected before any solver
    /// call.
    #[error("insufficient data: need at least {required} points, got {provided}")]
    InsufficientData {
        /// Minimum number of points required.
        required: usize,
        /// Number of points provided.
        provided: usize,
    },
}

impl FitError {
    /// Create an undefined-parameter error.
    pub fn undefined_parameter(name: impl Into<String>) -> Self {
        Self::UndefinedParameter { name: name.into() }
    }

    /// Create a domain error.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Create a convergence error.
    pub fn convergence(iterations: usize, residual_norm: f64, last_estimate: Vec<f64>) -> Self {
        Self::Convergence {
            iterations,
            residual_norm,
            last_estimate,
        }
    }

    /// Create a singular-Jacobian error.
    pub fn singular_jacobian(rank: usize, expected: usize) -> Self {
        Self::SingularJacobian { rank, expected }
    }

    /// Create an insufficient-data error.
    pub fn insufficient_data(required: usize, provided: usize) -> Self {
        Self::InsufficientData { required, provided }
    }

    /// Check if this is a domain error.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain { .. })
    }

    /// Check if this is a convergence failure.
    pub fn is_convergence(&self) -> bool {
        matches!(self, Self::Convergence { .. })
    }

    /// Check if this is a singular-Jacobian error.
    pub fn is_singular_jacobian(&self) -> bool {
        matches!(self, Self::SingularJacobian { .. })
    }

    /// Check if this is an insufficient-data error.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
