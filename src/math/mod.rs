//! Mathematical utilities: dense least-squares algebra and root location.

pub mod linalg;
pub mod roots;

pub use linalg::*;
pub use roots::*;
