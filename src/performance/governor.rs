//! Adaptive quality governor
//!
//! Samples are classified on a fixed check interval. A run of consecutive
//! poor checks steps the quality ladder down one level, at most once per
//! cooldown. Nothing here ever moves the ladder up on its own.

use super::events::{ErrorReporter, EventBus, SubscriberResult, SubscriptionHandle};
use super::quality::QualityLevel;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GovernorSettings {
    pub min_fps: f32,
    pub max_memory_percent: f32,
    pub check_interval_ms: u64,
    pub consecutive_samples: u32,
    pub cooldown_ms: u64,
    pub history_size: usize,
    pub initial_quality: QualityLevel,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            min_fps: 20.0,
            max_memory_percent: 85.0,
            check_interval_ms: 1000,
            consecutive_samples: 3,
            cooldown_ms: 5000,
            history_size: 60,
            initial_quality: QualityLevel::DEFAULT,
        }
    }
}

impl GovernorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_fps.is_finite() || self.min_fps <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "min fps",
                value: self.min_fps,
            });
        }
        if !(self.max_memory_percent > 0.0 && self.max_memory_percent <= 100.0) {
            return Err(ConfigError::InvalidMemoryCap(self.max_memory_percent));
        }
        if self.check_interval_ms == 0 {
            return Err(ConfigError::ZeroValue {
                name: "check interval",
            });
        }
        if self.consecutive_samples == 0 {
            return Err(ConfigError::ZeroValue {
                name: "consecutive sample count",
            });
        }
        if self.history_size == 0 {
            return Err(ConfigError::ZeroValue {
                name: "performance history size",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub fps: f32,
    pub avg_fps: f32,
    pub memory_usage_percent: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationEvent {
    pub previous: QualityLevel,
    pub new: QualityLevel,
    pub reason: String,
    pub sample: Option<PerformanceSample>,
    pub timestamp_ms: u64,
}

pub struct QualityGovernor {
    settings: GovernorSettings,
    current: QualityLevel,
    poor_streak: u32,
    last_check_ms: Option<u64>,
    last_downgrade_ms: Option<u64>,
    history: VecDeque<PerformanceSample>,
    events: EventBus<OptimizationEvent>,
}

impl QualityGovernor {
    pub fn new(settings: GovernorSettings, reporter: Arc<dyn ErrorReporter>) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            current: settings.initial_quality,
            poor_streak: 0,
            last_check_ms: None,
            last_downgrade_ms: None,
            history: VecDeque::with_capacity(settings.history_size),
            events: EventBus::new("optimization", reporter),
            settings,
        })
    }

    /// Record a sample and, if a check is due, act on it.
    ///
    /// Returns the downgrade event when one was applied.
    pub fn evaluate(&mut self, sample: PerformanceSample) -> Option<OptimizationEvent> {
        if self.history.len() >= self.settings.history_size {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        if let Some(last) = self.last_check_ms
            && sample.timestamp_ms.saturating_sub(last) < self.settings.check_interval_ms
        {
            return None;
        }
        self.last_check_ms = Some(sample.timestamp_ms);

        let Some(reason) = self.poor_reason(&sample) else {
            if self.poor_streak > 0 {
                debug!("Performance recovered after {} poor checks", self.poor_streak);
            }
            self.poor_streak = 0;
            return None;
        };

        self.poor_streak += 1;
        debug!(
            "Poor performance check {}/{}: {}",
            self.poor_streak, self.settings.consecutive_samples, reason
        );

        if self.poor_streak < self.settings.consecutive_samples || !self.cooldown_elapsed(sample.timestamp_ms) {
            return None;
        }

        let Some(lower) = self.current.lower() else {
            debug!("Already at lowest quality, nothing to downgrade");
            return None;
        };

        let reason = format!("{} for {} consecutive checks", reason, self.poor_streak);
        self.poor_streak = 0;
        self.last_downgrade_ms = Some(sample.timestamp_ms);
        Some(self.apply(lower, reason, Some(sample), sample.timestamp_ms))
    }

    /// Explicitly pick a level, e.g. from a user setting. Emits an event when it changes.
    pub fn set_quality(&mut self, level: QualityLevel, timestamp_ms: u64) -> Option<OptimizationEvent> {
        if level == self.current {
            return None;
        }
        Some(self.apply(level, "manual selection".to_string(), None, timestamp_ms))
    }

    /// Manual step up the ladder
    pub fn upgrade(&mut self, timestamp_ms: u64) -> Option<OptimizationEvent> {
        let higher = self.current.higher()?;
        Some(self.apply(higher, "manual upgrade".to_string(), None, timestamp_ms))
    }

    /// Manual step down the ladder; does not touch the cooldown
    pub fn downgrade(&mut self, timestamp_ms: u64) -> Option<OptimizationEvent> {
        let lower = self.current.lower()?;
        Some(self.apply(lower, "manual downgrade".to_string(), None, timestamp_ms))
    }

    pub fn current_quality(&self) -> QualityLevel {
        self.current
    }

    pub fn poor_streak(&self) -> u32 {
        self.poor_streak
    }

    pub fn history(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.history.iter()
    }

    pub fn last_sample(&self) -> Option<&PerformanceSample> {
        self.history.back()
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&OptimizationEvent) -> SubscriberResult + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    /// Forget counters and history; the current level is kept.
    pub fn reset(&mut self) {
        self.poor_streak = 0;
        self.last_check_ms = None;
        self.last_downgrade_ms = None;
        self.history.clear();
    }

    fn poor_reason(&self, sample: &PerformanceSample) -> Option<String> {
        let min_fps = self.settings.min_fps;
        if sample.fps < min_fps {
            Some(format!("fps {:.1} below minimum {:.1}", sample.fps, min_fps))
        } else if sample.avg_fps < min_fps {
            Some(format!("average fps {:.1} below minimum {:.1}", sample.avg_fps, min_fps))
        } else if sample.memory_usage_percent > self.settings.max_memory_percent {
            Some(format!(
                "memory usage {:.0}% above cap {:.0}%",
                sample.memory_usage_percent, self.settings.max_memory_percent
            ))
        } else {
            None
        }
    }

    fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        self.last_downgrade_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.settings.cooldown_ms)
    }

    fn apply(
        &mut self,
        level: QualityLevel,
        reason: String,
        sample: Option<PerformanceSample>,
        timestamp_ms: u64,
    ) -> OptimizationEvent {
        let event = OptimizationEvent {
            previous: self.current,
            new: level,
            reason,
            sample,
            timestamp_ms,
        };
        if level < self.current && sample.is_some() {
            warn!("Quality {} -> {}: {}", event.previous, event.new, event.reason);
        } else {
            info!("Quality {} -> {}: {}", event.previous, event.new, event.reason);
        }
        self.current = level;
        self.events.notify(&event);
        event
    }
}
