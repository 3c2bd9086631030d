//! Ingestion module.
//!
//! - Grouper: validated points to per-experiment series
//! - Pipeline: header check, fail-fast validation, totals

pub mod grouper;
pub mod pipeline;

pub use grouper::group_points;
pub use pipeline::*;
