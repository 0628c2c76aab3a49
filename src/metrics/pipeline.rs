//! Per-frame exercise metrics
//!
//! Selects which landmarks feed which geometry primitive and which tracker.
//! All arithmetic lives in `pose::geometry` and `history`.

use super::exercise::Exercise;
use crate::error::ConfigError;
use crate::history::{
    BarPathUpdate, DEFAULT_HISTORY_CAPACITY, LateralShiftUpdate, MetricsHistory, PathPoint,
};
use crate::pose::geometry::{DEFAULT_VISIBILITY_THRESHOLD, all_reliable, angle_degrees, midpoint};
use crate::pose::landmark::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub exercise: Exercise,
    pub visibility_threshold: f32,
    pub history_capacity: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            exercise: Exercise::default(),
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl MetricsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "visibility threshold",
                value: self.visibility_threshold,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroValue {
                name: "history capacity",
            });
        }
        Ok(())
    }
}

/// Joint angles for one side of the body, in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SideAngles {
    /// shoulder - hip - knee
    pub hip: Option<f32>,
    /// hip - knee - ankle
    pub knee: Option<f32>,
    /// knee - ankle - foot index
    pub ankle: Option<f32>,
    /// shoulder - elbow - wrist, only for lifts that track the arms
    pub elbow: Option<f32>,
}

/// Metrics for one frame.
///
/// When `has_valid_pose` is false every other field is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseMetrics {
    pub has_valid_pose: bool,
    pub timestamp_ms: u64,
    pub left: Option<SideAngles>,
    pub right: Option<SideAngles>,
    /// Hip midpoint height below the knee midpoint (positive = below)
    pub depth: Option<f32>,
    pub below_parallel: Option<bool>,
    pub lateral_shift: Option<LateralShiftUpdate>,
    pub bar_path: Option<BarPathUpdate>,
}

impl ExerciseMetrics {
    fn not_computed(timestamp_ms: u64) -> Self {
        Self {
            has_valid_pose: false,
            timestamp_ms,
            left: None,
            right: None,
            depth: None,
            below_parallel: None,
            lateral_shift: None,
            bar_path: None,
        }
    }
}

struct Side {
    shoulder: usize,
    elbow: usize,
    wrist: usize,
    hip: usize,
    knee: usize,
    ankle: usize,
    foot: usize,
}

const LEFT: Side = Side {
    shoulder: LEFT_SHOULDER,
    elbow: LEFT_ELBOW,
    wrist: LEFT_WRIST,
    hip: LEFT_HIP,
    knee: LEFT_KNEE,
    ankle: LEFT_ANKLE,
    foot: LEFT_FOOT_INDEX,
};

const RIGHT: Side = Side {
    shoulder: RIGHT_SHOULDER,
    elbow: RIGHT_ELBOW,
    wrist: RIGHT_WRIST,
    hip: RIGHT_HIP,
    knee: RIGHT_KNEE,
    ankle: RIGHT_ANKLE,
    foot: RIGHT_FOOT_INDEX,
};

pub struct MetricsPipeline {
    settings: MetricsSettings,
    history: MetricsHistory,
}

impl MetricsPipeline {
    pub fn new(settings: MetricsSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            history: MetricsHistory::new(settings.history_capacity),
            settings,
        })
    }

    pub fn process(&mut self, frame: &LandmarkFrame, timestamp_ms: u64) -> ExerciseMetrics {
        let exercise = self.settings.exercise;
        let threshold = self.settings.visibility_threshold;

        let required = frame.select(exercise.required_landmarks());
        if !all_reliable(&required, threshold) {
            debug!("Skipping {} metrics at {}ms: key landmarks unreliable", exercise, timestamp_ms);
            return ExerciseMetrics::not_computed(timestamp_ms);
        }

        let left = self.side_angles(frame, &LEFT);
        let right = self.side_angles(frame, &RIGHT);

        let hip_mid = midpoint(&frame[LEFT_HIP], &frame[RIGHT_HIP]);
        let ankle_mid = midpoint(&frame[LEFT_ANKLE], &frame[RIGHT_ANKLE]);

        // Knees are not required for every lift
        let knee_mid = midpoint(&frame[LEFT_KNEE], &frame[RIGHT_KNEE]);
        let depth = (knee_mid.visibility >= threshold).then(|| hip_mid.y - knee_mid.y);

        let lateral_shift = self
            .history
            .update_lateral_shift(hip_mid.x - ankle_mid.x, depth);

        let (left_ref, right_ref) = exercise.bar_reference().landmarks();
        let bar = midpoint(&frame[left_ref], &frame[right_ref]);
        let bar_path = self
            .history
            .update_bar_path(PathPoint::new(bar.x, bar.y), timestamp_ms);

        ExerciseMetrics {
            has_valid_pose: true,
            timestamp_ms,
            left: Some(left),
            right: Some(right),
            depth,
            below_parallel: depth.map(|d| d >= 0.0),
            lateral_shift: Some(lateral_shift),
            bar_path: Some(bar_path),
        }
    }

    fn side_angles(&self, frame: &LandmarkFrame, side: &Side) -> SideAngles {
        let threshold = self.settings.visibility_threshold;
        let elbow = if self.settings.exercise.tracks_elbows() {
            angle_degrees(&frame[side.shoulder], &frame[side.elbow], &frame[side.wrist], threshold)
        } else {
            None
        };

        SideAngles {
            hip: angle_degrees(&frame[side.shoulder], &frame[side.hip], &frame[side.knee], threshold),
            knee: angle_degrees(&frame[side.hip], &frame[side.knee], &frame[side.ankle], threshold),
            ankle: angle_degrees(&frame[side.knee], &frame[side.ankle], &frame[side.foot], threshold),
            elbow,
        }
    }

    /// Switching exercise starts a fresh set
    pub fn set_exercise(&mut self, exercise: Exercise) {
        if exercise != self.settings.exercise {
            self.settings.exercise = exercise;
            self.history.reset();
        }
    }

    pub fn exercise(&self) -> Exercise {
        self.settings.exercise
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn reset_lateral_shift(&mut self) {
        self.history.reset_lateral_shift();
    }

    pub fn reset_bar_path(&mut self) {
        self.history.reset_bar_path();
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Side-on squat skeleton with hips at `hip_y` (image y grows downward)
    pub(crate) fn squat_frame(hip_y: f32, hip_x: f32, visibility: f32) -> LandmarkFrame {
        let mut landmarks = [Landmark::new(0.5, 0.5, 0.0, visibility); LANDMARK_COUNT];
        let mut set = |index: usize, x: f32, y: f32| {
            landmarks[index] = Landmark::new(x, y, 0.0, visibility);
        };
        for (offset, side) in [(-0.05, &LEFT), (0.05, &RIGHT)] {
            set(side.shoulder, 0.5 + offset, 0.25);
            set(side.elbow, 0.5 + offset, 0.35);
            set(side.wrist, 0.5 + offset, 0.45);
            set(side.hip, hip_x + offset, hip_y);
            set(side.knee, 0.6 + offset, 0.6);
            set(side.ankle, 0.5 + offset, 0.85);
            set(side.foot, 0.6 + offset, 0.88);
        }
        LandmarkFrame::new(landmarks)
    }

    fn pipeline(exercise: Exercise) -> MetricsPipeline {
        MetricsPipeline::new(MetricsSettings {
            exercise,
            ..MetricsSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_unreliable_pose_is_not_computed() {
        let mut p = pipeline(Exercise::Squat);
        let mut frame = squat_frame(0.5, 0.5, 0.9);
        let mut landmarks = *frame.landmarks();
        landmarks[LEFT_KNEE].visibility = 0.2;
        frame = LandmarkFrame::new(landmarks);

        let metrics = p.process(&frame, 0);
        assert_eq!(metrics, ExerciseMetrics::not_computed(0));
        assert!(p.history().bar_path().start().is_none());
        assert!(p.history().lateral_shift().history().is_empty());
    }

    #[test]
    fn test_reliable_pose_computes_everything() {
        let mut p = pipeline(Exercise::Squat);
        let metrics = p.process(&squat_frame(0.5, 0.45, 0.9), 100);

        assert!(metrics.has_valid_pose);
        let left = metrics.left.unwrap();
        assert!(left.hip.is_some() && left.knee.is_some() && left.ankle.is_some());
        assert!(left.elbow.is_none());
        assert!((0.0..=180.0).contains(&left.knee.unwrap()));

        let depth = metrics.depth.unwrap();
        assert!((depth - -0.1).abs() < 1e-5);
        assert_eq!(metrics.below_parallel, Some(false));

        let shift = metrics.lateral_shift.unwrap();
        assert!((shift.current - -0.05).abs() < 1e-5);

        let bar = metrics.bar_path.unwrap();
        assert_eq!(bar.start, PathPoint::new(0.5, 0.25));
    }

    #[test]
    fn test_depth_and_shift_accumulate_over_a_rep() {
        let mut p = pipeline(Exercise::Squat);
        let descent = [(0.45, 0.50), (0.55, 0.52), (0.65, 0.56), (0.55, 0.51), (0.45, 0.50)];
        let mut last = None;
        for (i, (hip_y, hip_x)) in descent.into_iter().enumerate() {
            last = Some(p.process(&squat_frame(hip_y, hip_x, 0.9), i as u64 * 33));
        }
        let last = last.unwrap();

        let shift = last.lateral_shift.unwrap();
        assert!((shift.max_shift - 0.06).abs() < 1e-5);
        assert!((shift.depth_at_max.unwrap() - 0.05).abs() < 1e-5);
        assert_eq!(shift.history.len(), 5);
    }

    #[test]
    fn test_press_uses_wrists_and_elbows() {
        let mut p = pipeline(Exercise::OverheadPress);
        let metrics = p.process(&squat_frame(0.5, 0.5, 0.9), 0);
        let bar = metrics.bar_path.unwrap();
        assert_eq!(bar.start, PathPoint::new(0.5, 0.45));
        assert!(metrics.right.unwrap().elbow.is_some());
    }

    #[test]
    fn test_set_exercise_resets_history() {
        let mut p = pipeline(Exercise::Squat);
        p.process(&squat_frame(0.5, 0.5, 0.9), 0);
        p.set_exercise(Exercise::Deadlift);
        assert!(p.history().bar_path().start().is_none());
        assert_eq!(p.exercise(), Exercise::Deadlift);
    }

    #[test]
    fn test_invalid_settings() {
        let bad = MetricsSettings {
            visibility_threshold: 1.5,
            ..MetricsSettings::default()
        };
        assert!(MetricsPipeline::new(bad).is_err());
        let bad = MetricsSettings {
            history_capacity: 0,
            ..MetricsSettings::default()
        };
        assert!(MetricsPipeline::new(bad).is_err());
    }
}
