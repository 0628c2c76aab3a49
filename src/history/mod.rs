//! History trackers - bounded per-session time series
//!
//! `MetricsHistory` bundles the two trackers a session owns so either can be
//! reset without disturbing the other.

pub mod bar_path;
pub mod buffer;
pub mod lateral_shift;

pub use bar_path::{BarPathPoint, BarPathTracker, BarPathUpdate, PathPoint};
pub use buffer::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer, HistorySample, RunningMax};
pub use lateral_shift::{LateralShiftTracker, LateralShiftUpdate};

#[derive(Debug, Clone)]
pub struct MetricsHistory {
    lateral_shift: LateralShiftTracker,
    bar_path: BarPathTracker,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            lateral_shift: LateralShiftTracker::new(capacity),
            bar_path: BarPathTracker::new(capacity),
        }
    }

    pub fn update_lateral_shift(&mut self, deviation: f32, depth: Option<f32>) -> LateralShiftUpdate {
        self.lateral_shift.update(deviation, depth)
    }

    pub fn update_bar_path(&mut self, point: PathPoint, timestamp_ms: u64) -> BarPathUpdate {
        self.bar_path.update(point, timestamp_ms)
    }

    pub fn lateral_shift(&self) -> &LateralShiftTracker {
        &self.lateral_shift
    }

    pub fn bar_path(&self) -> &BarPathTracker {
        &self.bar_path
    }

    pub fn reset_lateral_shift(&mut self) {
        self.lateral_shift.reset();
    }

    pub fn reset_bar_path(&mut self) {
        self.bar_path.reset();
    }

    pub fn reset(&mut self) {
        self.reset_lateral_shift();
        self.reset_bar_path();
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_resets_are_independent() {
        let mut history = MetricsHistory::default();
        history.update_lateral_shift(0.05, Some(0.0));
        history.update_bar_path(PathPoint::new(0.5, 0.3), 0);

        history.reset_lateral_shift();
        assert_eq!(history.lateral_shift().max_shift(), 0.0);
        assert_eq!(history.bar_path().start(), Some(PathPoint::new(0.5, 0.3)));

        history.update_lateral_shift(0.02, None);
        history.reset_bar_path();
        assert_eq!(history.bar_path().start(), None);
        assert_eq!(history.lateral_shift().max_shift(), 0.02);

        history.update_bar_path(PathPoint::new(0.5, 0.3), 10);
        history.reset();
        assert!(history.lateral_shift().history().is_empty());
        assert!(history.bar_path().history().is_empty());
    }
}
