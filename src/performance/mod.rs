//! Performance module - frame throttling, quality ladder and monitoring
//!
//! Re-exports only. All logic in submodules.

pub mod events;
pub mod governor;
pub mod monitor;
pub mod quality;
pub mod throttle;

pub use events::{
    ErrorReporter, EventBus, SubscriberError, SubscriberResult, SubscriptionHandle,
    TracingErrorReporter,
};
pub use governor::{GovernorSettings, OptimizationEvent, PerformanceSample, QualityGovernor};
pub use monitor::{PerformanceGrade, PerformanceMonitor, PerformanceStats, PerformanceUpdate};
pub use quality::{QualityLevel, QualitySettings};
pub use throttle::{DEFAULT_TARGET_FPS, FrameThrottle, ThrottleSettings};
