use super::buffer::{DEFAULT_HISTORY_CAPACITY, HistoryBuffer, HistorySample};
use serde::Serialize;

/// Image-plane position of the bar reference point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
}

impl PathPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarPathPoint {
    pub position: PathPoint,
    pub timestamp_ms: u64,
    /// Vertical offset from the path start (positive = below start)
    pub deviation: f32,
}

impl HistorySample for BarPathPoint {
    fn magnitude(&self) -> f32 {
        self.deviation.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPathUpdate {
    pub current: PathPoint,
    pub history: Vec<BarPathPoint>,
    pub current_deviation: f32,
    pub max_deviation: f32,
    pub start: PathPoint,
}

/// Trajectory of the bar reference point, relative to where the set began
#[derive(Debug, Clone)]
pub struct BarPathTracker {
    history: HistoryBuffer<BarPathPoint>,
    start: Option<PathPoint>,
}

impl BarPathTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: HistoryBuffer::new(capacity),
            start: None,
        }
    }

    pub fn update(&mut self, point: PathPoint, timestamp_ms: u64) -> BarPathUpdate {
        // First point of the set is latched until reset
        let start = *self.start.get_or_insert(point);
        let deviation = point.y - start.y;

        self.history.push(BarPathPoint {
            position: point,
            timestamp_ms,
            deviation,
        });

        BarPathUpdate {
            current: point,
            history: self.history.snapshot(),
            current_deviation: deviation,
            max_deviation: self.max_deviation(),
            start,
        }
    }

    pub fn start(&self) -> Option<PathPoint> {
        self.start
    }

    pub fn max_deviation(&self) -> f32 {
        self.history.running_max().map_or(0.0, |max| max.value)
    }

    pub fn history(&self) -> &HistoryBuffer<BarPathPoint> {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.start = None;
    }
}

impl Default for BarPathTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_point_latches_start() {
        let mut tracker = BarPathTracker::default();
        let first = tracker.update(PathPoint::new(0.5, 0.3), 0);
        assert_eq!(first.start, PathPoint::new(0.5, 0.3));
        assert_eq!(first.current_deviation, 0.0);

        let second = tracker.update(PathPoint::new(0.52, 0.45), 33);
        assert_eq!(second.start, PathPoint::new(0.5, 0.3));
        assert!((second.current_deviation - 0.15).abs() < 1e-6);
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.history[1].timestamp_ms, 33);
    }

    #[test]
    fn test_max_deviation_outlives_window() {
        let mut tracker = BarPathTracker::new(3);
        tracker.update(PathPoint::new(0.5, 0.3), 0);
        tracker.update(PathPoint::new(0.5, 0.6), 33);
        for t in 2..8u64 {
            tracker.update(PathPoint::new(0.5, 0.31), t * 33);
        }
        assert_eq!(tracker.history().len(), 3);
        assert!((tracker.max_deviation() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_start() {
        let mut tracker = BarPathTracker::default();
        tracker.update(PathPoint::new(0.5, 0.3), 0);
        tracker.reset();
        assert_eq!(tracker.start(), None);

        let update = tracker.update(PathPoint::new(0.1, 0.9), 100);
        assert_eq!(update.start, PathPoint::new(0.1, 0.9));
        assert_eq!(update.max_deviation, 0.0);
    }
}
