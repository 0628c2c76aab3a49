use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture/inference presets, ordered lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Minimal,
    Low,
    Medium,
    High,
    Ultra,
}

/// What a capture source should apply for a quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualitySettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl QualityLevel {
    /// Sessions start in the middle of the ladder
    pub const DEFAULT: QualityLevel = QualityLevel::Medium;

    pub fn settings(&self) -> QualitySettings {
        let (width, height, frame_rate) = match self {
            Self::Ultra => (1920, 1080, 60),
            Self::High => (1280, 720, 30),
            Self::Medium => (960, 540, 30),
            Self::Low => (640, 480, 24),
            Self::Minimal => (480, 360, 15),
        };
        QualitySettings {
            width,
            height,
            frame_rate,
        }
    }

    /// One step down, or `None` at the floor
    pub fn lower(&self) -> Option<Self> {
        match self {
            Self::Ultra => Some(Self::High),
            Self::High => Some(Self::Medium),
            Self::Medium => Some(Self::Low),
            Self::Low => Some(Self::Minimal),
            Self::Minimal => None,
        }
    }

    /// One step up, or `None` at the top
    pub fn higher(&self) -> Option<Self> {
        match self {
            Self::Minimal => Some(Self::Low),
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => Some(Self::Ultra),
            Self::Ultra => None,
        }
    }
}

impl Default for QualityLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ultra => "ultra",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
        };
        write!(f, "{name}")
    }
}
