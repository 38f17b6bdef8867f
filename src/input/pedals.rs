//! Pedal axis normalization
//!
//! Wheel pedals report a bipolar axis value in [-1, 1] where -1 is fully
//! released. Actuation wants a unipolar [0, 1] command. Inversion is an
//! explicit parameter so the same function serves both the static per-axis
//! polarity flip and the reverse-gear throttle flip.

/// Maps a raw axis reading in [-1, 1] to a normalized [0, 1] value.
///
/// A missing or non-finite reading yields 0.0: a pedal that cannot be read
/// is treated as released, never as pressed. Out-of-range readings are
/// clamped before rescaling. With `invert` the result is flipped
/// (`1.0 -> 0.0`, `0.0 -> 1.0`).
pub fn normalize(raw: Option<f32>, invert: bool) -> f32 {
    let raw = match raw {
        Some(r) if r.is_finite() => r,
        _ => return 0.0,
    };
    let value = (raw.clamp(-1.0, 1.0) + 1.0) / 2.0;
    if invert {
        1.0 - value
    } else {
        value
    }
}
