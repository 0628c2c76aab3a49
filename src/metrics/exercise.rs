use crate::pose::landmark::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    #[default]
    Squat,
    Deadlift,
    OverheadPress,
}

const SQUAT_LANDMARKS: [usize; 8] = [
    LEFT_SHOULDER, RIGHT_SHOULDER,
    LEFT_HIP, RIGHT_HIP,
    LEFT_KNEE, RIGHT_KNEE,
    LEFT_ANKLE, RIGHT_ANKLE,
];

const BARBELL_LANDMARKS: [usize; 10] = [
    LEFT_SHOULDER, RIGHT_SHOULDER,
    LEFT_WRIST, RIGHT_WRIST,
    LEFT_HIP, RIGHT_HIP,
    LEFT_KNEE, RIGHT_KNEE,
    LEFT_ANKLE, RIGHT_ANKLE,
];

const PRESS_LANDMARKS: [usize; 10] = [
    LEFT_SHOULDER, RIGHT_SHOULDER,
    LEFT_ELBOW, RIGHT_ELBOW,
    LEFT_WRIST, RIGHT_WRIST,
    LEFT_HIP, RIGHT_HIP,
    LEFT_ANKLE, RIGHT_ANKLE,
];

/// Which midpoint stands in for the bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarReference {
    /// Bar on the upper back
    Shoulders,
    /// Bar in the hands
    Wrists,
}

impl BarReference {
    pub fn landmarks(&self) -> (usize, usize) {
        match self {
            Self::Shoulders => (LEFT_SHOULDER, RIGHT_SHOULDER),
            Self::Wrists => (LEFT_WRIST, RIGHT_WRIST),
        }
    }
}

impl Exercise {
    /// Minimal landmark set that must be reliable before any metric is computed
    pub fn required_landmarks(&self) -> &'static [usize] {
        match self {
            Self::Squat => &SQUAT_LANDMARKS,
            Self::Deadlift => &BARBELL_LANDMARKS,
            Self::OverheadPress => &PRESS_LANDMARKS,
        }
    }

    pub fn bar_reference(&self) -> BarReference {
        match self {
            Self::Squat => BarReference::Shoulders,
            Self::Deadlift | Self::OverheadPress => BarReference::Wrists,
        }
    }

    /// Whether elbow angles are part of this lift's metrics
    pub fn tracks_elbows(&self) -> bool {
        matches!(self, Self::OverheadPress)
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squat => write!(f, "squat"),
            Self::Deadlift => write!(f, "deadlift"),
            Self::OverheadPress => write!(f, "overhead press"),
        }
    }
}
