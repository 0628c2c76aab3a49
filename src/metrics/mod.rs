//! Metrics module - exercise-specific form measurements
//!
//! Re-exports only. All logic in submodules.

pub mod exercise;
pub mod pipeline;

pub use exercise::{BarReference, Exercise};
pub use pipeline::{ExerciseMetrics, MetricsPipeline, MetricsSettings, SideAngles};
