pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod performance;
pub mod pose;
pub mod session;
pub mod stabilizer;

pub use crate::config::Settings;
pub use error::{AppError, ConfigError};

pub use metrics::{Exercise, ExerciseMetrics, MetricsPipeline};
pub use performance::{OptimizationEvent, PerformanceUpdate, QualityGovernor, QualityLevel};
pub use pose::{Landmark, LandmarkFrame};
pub use session::{AnalysisSession, FrameInput, FrameResult};
pub use stabilizer::{DetectionState, HysteresisStabilizer, StabilizerStrategy, ValidityStabilizer};
