//! Landmark geometry primitives
//!
//! Pure functions, no state. Anything that depends on a poorly tracked
//! landmark returns `None` instead of a number so callers can tell
//! "not computed" apart from "computed as zero".

use super::landmark::Landmark;

/// Default minimum visibility for a landmark to be trusted
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

/// Rays shorter than this are treated as degenerate
const MIN_RAY_LENGTH: f32 = 1e-6;

/// Angle at `vertex` between the rays to `a` and `c`, in degrees.
///
/// Uses the image plane (x, y); provider depth is too noisy for joint angles.
/// cos(θ) = (v1 · v2) / (|v1| × |v2|), clamped to [-1, 1] before `acos`.
///
/// - `None` when the vertex visibility is below `threshold`
/// - `Some(0.0)` when either ray has zero length (coincident points)
/// - otherwise a value in [0, 180]
pub fn angle_degrees(a: &Landmark, vertex: &Landmark, c: &Landmark, threshold: f32) -> Option<f32> {
    if !is_reliable(vertex, threshold) {
        return None;
    }

    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (c.x - vertex.x, c.y - vertex.y);

    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    if mag1 < MIN_RAY_LENGTH || mag2 < MIN_RAY_LENGTH {
        return Some(0.0);
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);

    Some(cos_angle.acos().to_degrees())
}

/// Euclidean distance in the image plane
pub fn distance_2d(a: &Landmark, b: &Landmark, threshold: f32) -> Option<f32> {
    if !is_reliable(a, threshold) || !is_reliable(b, threshold) {
        return None;
    }
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    Some((dx * dx + dy * dy).sqrt())
}

/// Euclidean distance including provider depth
pub fn distance_3d(a: &Landmark, b: &Landmark, threshold: f32) -> Option<f32> {
    if !is_reliable(a, threshold) || !is_reliable(b, threshold) {
        return None;
    }
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    Some((dx * dx + dy * dy + dz * dz).sqrt())
}

/// Componentwise average. The result is only as trustworthy as the weaker
/// input, so its visibility is the minimum of the two.
pub fn midpoint(a: &Landmark, b: &Landmark) -> Landmark {
    Landmark {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
        z: (a.z + b.z) / 2.0,
        visibility: a.visibility.min(b.visibility),
    }
}

pub fn is_reliable(landmark: &Landmark, threshold: f32) -> bool {
    landmark.visibility >= threshold
}

/// True when every landmark clears `threshold`. An empty set is reliable.
pub fn all_reliable<'a, I>(landmarks: I, threshold: f32) -> bool
where
    I: IntoIterator<Item = &'a Landmark>,
{
    landmarks.into_iter().all(|l| is_reliable(l, threshold))
}
