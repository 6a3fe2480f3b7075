// In crates/analytics/src/lib.rs

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod types;

// Re-export the most important types for easy access.
pub use engine::AnalyticsEngine;
pub use error::{Error, Result};
pub use evaluator::{Evaluator, VectorizedEvaluator};
pub use types::{CostModel, EquityPoint, PerformanceReport, Trade};
