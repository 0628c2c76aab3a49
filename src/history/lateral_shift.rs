use super::buffer::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer};
use serde::Serialize;

/// Snapshot returned after each lateral shift update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LateralShiftUpdate {
    /// Signed deviation of this sample (positive = toward image right)
    pub current: f32,
    /// Largest deviation magnitude since reset
    pub max_shift: f32,
    /// The deviation that set `max_shift`, with its side
    pub signed_max_shift: f32,
    /// Depth observed when `max_shift` was recorded
    pub depth_at_max: Option<f32>,
    pub history: Vec<f32>,
}

/// Tracks side-to-side hip drift across a set
#[derive(Debug, Clone)]
pub struct LateralShiftTracker {
    history: HistoryBuffer<f32>,
    depth_at_max: Option<f32>,
}

impl LateralShiftTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: HistoryBuffer::new(capacity),
            depth_at_max: None,
        }
    }

    pub fn update(&mut self, deviation: f32, depth: Option<f32>) -> LateralShiftUpdate {
        if self.history.push(deviation) {
            self.depth_at_max = depth;
        }

        LateralShiftUpdate {
            current: deviation,
            max_shift: self.max_shift(),
            signed_max_shift: self.signed_max_shift(),
            depth_at_max: self.depth_at_max,
            history: self.history.snapshot(),
        }
    }

    pub fn max_shift(&self) -> f32 {
        self.history.running_max().map_or(0.0, |max| max.value)
    }

    /// Largest deviation as observed; negative means toward image left
    pub fn signed_max_shift(&self) -> f32 {
        self.history.running_max().map_or(0.0, |max| max.sample)
    }

    pub fn depth_at_max(&self) -> Option<f32> {
        self.depth_at_max
    }

    pub fn history(&self) -> &HistoryBuffer<f32> {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.depth_at_max = None;
    }
}

impl Default for LateralShiftTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
