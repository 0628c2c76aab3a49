use super::events::{ErrorReporter, EventBus, SubscriberResult, SubscriptionHandle};
use super::governor::PerformanceSample;
use super::quality::QualityLevel;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// EWMA smoothing factor for average fps and processing time
const ALPHA: f32 = 0.1;

/// FPS is measured over windows of at least this length
const FPS_WINDOW_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl PerformanceGrade {
    pub fn from_fps(fps: f32, target_fps: f32) -> Self {
        let ratio = if target_fps > 0.0 { fps / target_fps } else { 0.0 };
        if ratio >= 0.9 {
            Self::Excellent
        } else if ratio >= 0.75 {
            Self::Good
        } else if ratio >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceUpdate {
    pub fps: f32,
    pub avg_fps: f32,
    pub memory_percent: f32,
    pub frame_drops: u64,
    pub processing_time_ms: f32,
    pub quality: QualityLevel,
    pub grade: PerformanceGrade,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceStats {
    pub total_frames: u64,
    pub frame_drops: u64,
    pub fps: f32,
    pub avg_fps: f32,
    pub last_processing_time: Duration,
    pub avg_processing_time_us: f32,
}

/// Derives frame-rate statistics from accepted frames
pub struct PerformanceMonitor {
    target_fps: f32,
    frame_budget: Duration,
    stats: PerformanceStats,
    window_start_ms: Option<u64>,
    window_frames: u32,
    has_measurement: bool,
    events: EventBus<PerformanceUpdate>,
}

impl PerformanceMonitor {
    pub fn new(target_fps: f32, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f32(1.0 / target_fps.max(f32::EPSILON)),
            stats: PerformanceStats::default(),
            window_start_ms: None,
            window_frames: 0,
            has_measurement: false,
            events: EventBus::new("performance", reporter),
        }
    }

    fn update_ewma(current: f32, new_value: f32) -> f32 {
        current * (1.0 - ALPHA) + new_value * ALPHA
    }

    /// Record a frame that went through the pipeline
    pub fn record_frame(&mut self, timestamp_ms: u64, processing_time: Duration) {
        let stats = &mut self.stats;
        stats.total_frames += 1;
        stats.last_processing_time = processing_time;
        stats.avg_processing_time_us = if stats.total_frames == 1 {
            processing_time.as_micros() as f32
        } else {
            Self::update_ewma(stats.avg_processing_time_us, processing_time.as_micros() as f32)
        };

        if processing_time > self.frame_budget {
            stats.frame_drops += 1;
            tracing::debug!(
                "Frame at {}ms took {:?}, over the {:?} budget",
                timestamp_ms,
                processing_time,
                self.frame_budget
            );
        }

        // Frames are counted as intervals: the frame that opens a window is not in it
        let Some(start) = self.window_start_ms else {
            self.window_start_ms = Some(timestamp_ms);
            return;
        };
        self.window_frames += 1;
        let elapsed = timestamp_ms.saturating_sub(start);
        if elapsed >= FPS_WINDOW_MS {
            let fps = Self::window_fps(self.window_frames, elapsed);
            stats.fps = fps;
            stats.avg_fps = if self.has_measurement {
                Self::update_ewma(stats.avg_fps, fps)
            } else {
                fps
            };
            self.has_measurement = true;
            self.window_frames = 0;
            self.window_start_ms = Some(timestamp_ms);
        }
    }

    fn window_fps(frames: u32, elapsed_ms: u64) -> f32 {
        frames as f32 * 1000.0 / elapsed_ms as f32
    }

    /// Fps of the window still open at `timestamp_ms`, once it has run a full
    /// window length without a frame closing it.
    fn open_window_fps(&self, timestamp_ms: u64) -> Option<f32> {
        let elapsed = timestamp_ms.saturating_sub(self.window_start_ms?);
        (elapsed >= FPS_WINDOW_MS).then(|| Self::window_fps(self.window_frames, elapsed))
    }

    /// Fps as of `timestamp_ms`. A stalled source decays toward zero instead
    /// of repeating the last closed window.
    pub fn fps_at(&self, timestamp_ms: u64) -> f32 {
        self.open_window_fps(timestamp_ms).unwrap_or(self.stats.fps)
    }

    /// A governor sample, once at least one full fps window has elapsed
    pub fn sample(&self, timestamp_ms: u64, memory_usage_percent: f32) -> Option<PerformanceSample> {
        let open = self.open_window_fps(timestamp_ms);
        if !self.has_measurement && open.is_none() {
            return None;
        }
        let fps = open.unwrap_or(self.stats.fps);
        Some(PerformanceSample {
            fps,
            avg_fps: if self.has_measurement { self.stats.avg_fps } else { fps },
            memory_usage_percent,
            timestamp_ms,
        })
    }

    /// Build and broadcast a performance update
    pub fn publish(&mut self, timestamp_ms: u64, memory_percent: f32, quality: QualityLevel) -> PerformanceUpdate {
        let fps = self.fps_at(timestamp_ms);
        let update = PerformanceUpdate {
            fps,
            avg_fps: self.stats.avg_fps,
            memory_percent,
            frame_drops: self.stats.frame_drops,
            processing_time_ms: self.stats.last_processing_time.as_secs_f32() * 1000.0,
            quality,
            grade: PerformanceGrade::from_fps(fps, self.target_fps),
            timestamp_ms,
        };
        self.events.notify(&update);
        update
    }

    pub fn grade(&self) -> PerformanceGrade {
        PerformanceGrade::from_fps(self.stats.fps, self.target_fps)
    }

    pub fn stats(&self) -> PerformanceStats {
        self.stats
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&PerformanceUpdate) -> SubscriberResult + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    pub fn reset(&mut self) {
        self.stats = PerformanceStats::default();
        self.window_start_ms = None;
        self.window_frames = 0;
        self.has_measurement = false;
    }
}
