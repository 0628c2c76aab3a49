use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TARGET_FPS: f32 = 30.0;
const MAX_TARGET_FPS: f32 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub target_fps: f32,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

/// Rejects frames that arrive sooner than the target frame interval
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    target_fps: f32,
    min_interval_ms: u64,
    last_accepted_ms: Option<u64>,
    rejected: u64,
}

impl FrameThrottle {
    pub fn new(settings: ThrottleSettings) -> Result<Self, ConfigError> {
        let fps = settings.target_fps;
        if !fps.is_finite() || fps <= 0.0 || fps > MAX_TARGET_FPS {
            return Err(ConfigError::InvalidTargetFps(fps));
        }
        Ok(Self {
            target_fps: fps,
            // Whole milliseconds, rounded down so a steady 30fps source is not starved
            min_interval_ms: (1000.0 / fps).floor() as u64,
            last_accepted_ms: None,
            rejected: 0,
        })
    }

    /// Accept or reject a frame arriving at `timestamp_ms`.
    pub fn try_accept(&mut self, timestamp_ms: u64) -> bool {
        if let Some(last) = self.last_accepted_ms
            && (timestamp_ms < last || timestamp_ms - last < self.min_interval_ms)
        {
            self.rejected += 1;
            debug!(
                "Throttled frame at {}ms ({}ms since last accepted)",
                timestamp_ms,
                timestamp_ms.saturating_sub(last)
            );
            return false;
        }
        self.last_accepted_ms = Some(timestamp_ms);
        true
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Frame budget in milliseconds (1000 / target fps)
    pub fn frame_budget_ms(&self) -> f32 {
        1000.0 / self.target_fps
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
        self.rejected = 0;
    }
}
