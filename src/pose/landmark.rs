//! Landmark frames as delivered by the pose-inference provider.
//!
//! Indices follow the MediaPipe Pose topology (33 landmarks). A frame is
//! immutable once received; everything downstream works on copies.

use serde::{Deserialize, Serialize};

// ============================================================================
// LANDMARK INDICES (MediaPipe Pose - 33 total)
// ============================================================================

pub const LANDMARK_COUNT: usize = 33;

/// Values per landmark in a flat provider buffer (x, y, z, visibility)
pub const VALUES_PER_LANDMARK: usize = 4;

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;
pub const LEFT_HEEL: usize = 29;
pub const RIGHT_HEEL: usize = 30;
pub const LEFT_FOOT_INDEX: usize = 31;
pub const RIGHT_FOOT_INDEX: usize = 32;

// ============================================================================
// LANDMARK DATA STRUCTURES
// ============================================================================

/// A single tracked body point (normalized image coordinates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32, // 0-1 normalized, left to right
    pub y: f32, // 0-1 normalized, top to bottom
    pub z: f32, // Relative depth
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }
}

/// One frame of landmarks, index = body part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkFrame {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    /// Decode a flat provider buffer of `33 × 4` values.
    ///
    /// Returns `None` when the buffer has the wrong length; the caller treats
    /// that frame as missing.
    pub fn from_flat(data: &[f32]) -> Option<Self> {
        if data.len() != LANDMARK_COUNT * VALUES_PER_LANDMARK {
            tracing::warn!(
                "Invalid landmark data length: {} (expected {})",
                data.len(),
                LANDMARK_COUNT * VALUES_PER_LANDMARK
            );
            return None;
        }

        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (landmark, chunk) in landmarks
            .iter_mut()
            .zip(data.chunks_exact(VALUES_PER_LANDMARK))
        {
            *landmark = Landmark::new(chunk[0], chunk[1], chunk[2], chunk[3]);
        }
        Some(Self { landmarks })
    }

    /// Build from a list of landmarks, e.g. a deserialized replay record.
    pub fn from_slice(landmarks: &[Landmark]) -> Option<Self> {
        let landmarks: [Landmark; LANDMARK_COUNT] = landmarks.try_into().ok()?;
        Some(Self { landmarks })
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    /// Collect the landmarks at `indices`, skipping indices outside the frame.
    pub fn select(&self, indices: &[usize]) -> Vec<Landmark> {
        indices
            .iter()
            .filter_map(|&index| self.landmarks.get(index).copied())
            .collect()
    }

    /// Overall detection confidence: mean visibility of the key landmarks.
    ///
    /// An empty key set yields `0.0` so it can never switch a stabilizer on.
    pub fn confidence(&self, key_landmarks: &[usize]) -> f32 {
        let selected = self.select(key_landmarks);
        if selected.is_empty() {
            return 0.0;
        }
        let total: f32 = selected.iter().map(|l| l.visibility).sum();
        (total / selected.len() as f32).clamp(0.0, 1.0)
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); LANDMARK_COUNT],
        }
    }
}

impl std::ops::Index<usize> for LandmarkFrame {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Self::Output {
        &self.landmarks[index]
    }
}
