//! Speed macro.
//!
//! Contract:
//! - One control in percent drives both smoother time constants
//! - Square-root curve so the low end of the knob has resolution
//! - No state

use crate::dsp::utils::lerp;

const SLOWEST_ATTACK_MS: f32 = 500.0;
const FASTEST_ATTACK_MS: f32 = 5.0;
const SLOWEST_RELEASE_MS: f32 = 1000.0;
const FASTEST_RELEASE_MS: f32 = 20.0;

/// Maps a speed in percent to `(attack_ms, release_ms)`.
///
/// 0 % rides slowly and gently, 100 % tightly. Out-of-range and non-finite
/// inputs are clamped into [0, 100].
pub fn speed_to_ballistics(percent: f32) -> (f32, f32) {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let s = (percent / 100.0).sqrt();
    (
        lerp(SLOWEST_ATTACK_MS, FASTEST_ATTACK_MS, s),
        lerp(SLOWEST_RELEASE_MS, FASTEST_RELEASE_MS, s),
    )
}
