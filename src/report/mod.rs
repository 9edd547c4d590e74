//! Reporting: portable fit records and plain-text summaries.
//!
//! We keep serialization and formatting in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

pub mod format;
pub mod record;

pub use format::*;
pub use record::*;
