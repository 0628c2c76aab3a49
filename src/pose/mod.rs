//! Pose module - landmark model and geometry
//!
//! Re-exports only. All logic in submodules.

pub mod geometry;
pub mod landmark;

pub use geometry::{
    DEFAULT_VISIBILITY_THRESHOLD, all_reliable, angle_degrees, distance_2d, distance_3d,
    is_reliable, midpoint,
};
pub use landmark::{LANDMARK_COUNT, Landmark, LandmarkFrame};
