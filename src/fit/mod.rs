//! Fitting engine.
//!
//! Responsibilities:
//!
//! - choose the method from the dataset's uncertainty structure
//! - screen or validate the starting point
//! - drive the Levenberg-Marquardt loop (vertical or orthogonal residuals)
//! - assemble the immutable `FitResult` with scaled covariance

pub mod driver;
pub mod guess;
mod least_squares;
mod odr;
pub mod result;
pub mod selector;

pub use driver::fit;
pub use result::FitResult;
pub use selector::select_method;
