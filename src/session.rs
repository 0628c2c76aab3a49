//! Analysis session
//!
//! One session per camera stream. Frames flow throttle -> metrics pipeline ->
//! validity stabilizer -> performance monitor. Performance sampling runs on its
//! own cadence and drives the quality governor.

use crate::config::Settings;
use crate::error::ConfigError;
use crate::metrics::{Exercise, ExerciseMetrics, MetricsPipeline};
use crate::performance::{
    ErrorReporter, FrameThrottle, OptimizationEvent, PerformanceMonitor, PerformanceUpdate,
    QualityGovernor, QualityLevel, SubscriberResult, SubscriptionHandle,
};
use crate::pose::LandmarkFrame;
use crate::stabilizer::{DetectionState, ValidityStabilizer, ValidityStateInfo};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One frame from the pose provider
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub landmarks: LandmarkFrame,
    pub timestamp_ms: u64,
    /// Overall detection confidence, when the provider reports one
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    /// False when the throttle dropped the frame
    pub accepted: bool,
    pub detection: DetectionState,
    pub is_valid: bool,
    pub confidence: f32,
    pub metrics: Option<ExerciseMetrics>,
    pub processing_time: Duration,
}

impl FrameResult {
    fn throttled() -> Self {
        Self {
            accepted: false,
            detection: DetectionState::Invalid,
            is_valid: false,
            confidence: 0.0,
            metrics: None,
            processing_time: Duration::ZERO,
        }
    }
}

pub struct AnalysisSession {
    throttle: FrameThrottle,
    pipeline: MetricsPipeline,
    stabilizer: ValidityStabilizer,
    monitor: PerformanceMonitor,
    governor: QualityGovernor,
}

impl AnalysisSession {
    pub fn new(settings: &Settings, reporter: Arc<dyn ErrorReporter>) -> Result<Self, ConfigError> {
        let throttle = FrameThrottle::new(settings.throttle)?;
        let session = Self {
            pipeline: MetricsPipeline::new(settings.metrics)?,
            stabilizer: ValidityStabilizer::new(settings.stabilizer)?,
            monitor: PerformanceMonitor::new(throttle.target_fps(), Arc::clone(&reporter)),
            governor: QualityGovernor::new(settings.governor, reporter)?,
            throttle,
        };
        info!(
            "Started {} session at {} quality, {} fps target",
            session.pipeline.exercise(),
            session.governor.current_quality(),
            session.throttle.target_fps()
        );
        Ok(session)
    }

    pub fn process_frame(&mut self, input: FrameInput) -> FrameResult {
        if !self.throttle.try_accept(input.timestamp_ms) {
            return FrameResult::throttled();
        }
        let start = Instant::now();

        let confidence = input.confidence.unwrap_or_else(|| {
            input
                .landmarks
                .confidence(self.pipeline.exercise().required_landmarks())
        });
        let metrics = self.pipeline.process(&input.landmarks, input.timestamp_ms);
        let detection = self.stabilizer.update(confidence, input.timestamp_ms);

        let processing_time = start.elapsed();
        self.monitor.record_frame(input.timestamp_ms, processing_time);

        FrameResult {
            accepted: true,
            detection,
            is_valid: detection.is_valid(),
            confidence,
            metrics: Some(metrics),
            processing_time,
        }
    }

    /// Feed the governor and broadcast a performance update.
    ///
    /// Returns `None` until the monitor has measured a full fps window.
    pub fn sample_performance(&mut self, timestamp_ms: u64, memory_usage_percent: f32) -> Option<PerformanceUpdate> {
        let sample = self.monitor.sample(timestamp_ms, memory_usage_percent)?;
        if let Some(event) = self.governor.evaluate(sample) {
            debug!("Governor moved quality to {}", event.new);
        }
        Some(
            self.monitor
                .publish(timestamp_ms, memory_usage_percent, self.governor.current_quality()),
        )
    }

    pub fn current_quality(&self) -> QualityLevel {
        self.governor.current_quality()
    }

    pub fn set_quality(&mut self, level: QualityLevel, timestamp_ms: u64) -> Option<OptimizationEvent> {
        self.governor.set_quality(level, timestamp_ms)
    }

    pub fn upgrade_quality(&mut self, timestamp_ms: u64) -> Option<OptimizationEvent> {
        self.governor.upgrade(timestamp_ms)
    }

    pub fn downgrade_quality(&mut self, timestamp_ms: u64) -> Option<OptimizationEvent> {
        self.governor.downgrade(timestamp_ms)
    }

    pub fn subscribe_optimization<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&OptimizationEvent) -> SubscriberResult + 'static,
    {
        self.governor.subscribe(callback)
    }

    pub fn subscribe_performance<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&PerformanceUpdate) -> SubscriberResult + 'static,
    {
        self.monitor.subscribe(callback)
    }

    /// Remove a subscription from whichever channel holds it
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.governor.unsubscribe(handle) || self.monitor.unsubscribe(handle)
    }

    pub fn state_info(&self) -> ValidityStateInfo {
        self.stabilizer.state_info()
    }

    pub fn exercise(&self) -> Exercise {
        self.pipeline.exercise()
    }

    /// Switch lifts; trackers start over
    pub fn set_exercise(&mut self, exercise: Exercise) {
        self.pipeline.set_exercise(exercise);
    }

    pub fn pipeline(&self) -> &MetricsPipeline {
        &self.pipeline
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn throttle(&self) -> &FrameThrottle {
        &self.throttle
    }

    /// Start a new set. The quality level is kept.
    pub fn reset(&mut self) {
        self.throttle.reset();
        self.pipeline.reset();
        self.stabilizer.reset();
        self.monitor.reset();
        self.governor.reset();
        debug!("Session reset at {} quality", self.governor.current_quality());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::pipeline::tests::squat_frame;
    use crate::performance::TracingErrorReporter;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> AnalysisSession {
        AnalysisSession::new(&Settings::default(), Arc::new(TracingErrorReporter)).unwrap()
    }

    fn input(timestamp_ms: u64, confidence: Option<f32>) -> FrameInput {
        FrameInput {
            landmarks: squat_frame(0.5, 0.5, 0.9),
            timestamp_ms,
            confidence,
        }
    }

    #[test]
    fn test_throttled_frame_touches_nothing() {
        let mut s = session();
        let first = s.process_frame(input(0, Some(0.9)));
        assert!(first.accepted && first.is_valid);

        let second = s.process_frame(input(10, Some(0.1)));
        assert_eq!(second, FrameResult::throttled());
        assert_eq!(s.state_info().state, DetectionState::Valid);
        assert_eq!(s.monitor().stats().total_frames, 1);
        assert_eq!(s.pipeline().history().bar_path().history().len(), 1);
    }

    #[test]
    fn test_confidence_falls_back_to_landmark_visibility() {
        let mut s = session();
        let result = s.process_frame(input(0, None));
        assert!((result.confidence - 0.9).abs() < 1e-5);
        assert_eq!(result.detection, DetectionState::Valid);
        assert!(result.metrics.unwrap().has_valid_pose);
    }

    #[test]
    fn test_exit_debounce_through_session() {
        let mut s = session();
        assert!(s.process_frame(input(0, Some(0.8))).is_valid);
        assert_eq!(s.process_frame(input(100, Some(0.4))).detection, DetectionState::Detecting);
        assert_eq!(s.process_frame(input(200, Some(0.4))).detection, DetectionState::Detecting);
        assert_eq!(s.process_frame(input(300, Some(0.4))).detection, DetectionState::Invalid);
    }

    #[test]
    fn test_slow_frames_downgrade_quality() {
        let mut s = session();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        s.subscribe_optimization(move |event| {
            sink.borrow_mut().push(event.new);
            Ok(())
        });

        assert!(s.sample_performance(0, 40.0).is_none());

        // 10 fps: well under the 20 fps minimum
        let mut updates = 0;
        for i in 0..=40u64 {
            s.process_frame(input(i * 100, Some(0.9)));
            if i > 0 && i % 10 == 0 {
                let update = s.sample_performance(i * 100, 40.0).unwrap();
                assert!(update.fps < 20.0);
                updates += 1;
            }
        }
        assert_eq!(updates, 4);
        assert_eq!(*events.borrow(), vec![QualityLevel::Low]);
        assert_eq!(s.current_quality(), QualityLevel::Low);
    }

    #[test]
    fn test_stalled_provider_downgrades_quality() {
        let mut s = session();
        // A healthy second at 30fps, then nothing arrives
        for i in 0..32u64 {
            s.process_frame(input(i * 33, Some(0.9)));
        }
        let healthy = s.sample_performance(1023, 40.0).unwrap();
        assert!(healthy.fps > 20.0);

        for now in [3000, 4000, 5000] {
            let update = s.sample_performance(now, 40.0).unwrap();
            assert_eq!(update.fps, 0.0);
        }
        assert_eq!(s.current_quality(), QualityLevel::Low);
    }

    #[test]
    fn test_reset_keeps_quality() {
        let mut s = session();
        s.set_quality(QualityLevel::High, 0);
        s.process_frame(input(0, Some(0.9)));
        s.reset();

        assert_eq!(s.current_quality(), QualityLevel::High);
        assert_eq!(s.state_info().state, DetectionState::Invalid);
        assert_eq!(s.monitor().stats().total_frames, 0);
        // Throttle forgot the last frame, so an earlier timestamp is accepted again
        assert!(s.process_frame(input(0, Some(0.9))).accepted);
    }

    #[test]
    fn test_unsubscribe_either_channel() {
        let mut s = session();
        let perf = s.subscribe_performance(|_| Ok(()));
        let opt = s.subscribe_optimization(|_| Ok(()));
        assert!(s.unsubscribe(perf));
        assert!(s.unsubscribe(opt));
        assert!(!s.unsubscribe(opt));
    }
}
