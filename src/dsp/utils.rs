//! Shared numeric helpers for the rider's detectors.
//!
//! Every time-constant dependent coefficient in the crate goes through
//! [`time_constant_coeff`], so the detectors agree on what "10 ms" means.

/// Level floor reported by the detectors (dBFS).
pub const MIN_DB: f32 = -100.0;

/// Input level below which the rider refuses to ride (dBFS).
pub const SILENCE_THRESHOLD_DB: f32 = -60.0;

/// Linear envelope values below this are flushed to zero.
pub const DENORMAL_FLOOR: f32 = 1e-15;

/// Converts a linear gain to decibels, floored at `min_db`.
///
/// Non-positive gains report `min_db`.
#[inline]
pub fn gain_to_db(gain: f32, min_db: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(min_db)
    } else {
        min_db
    }
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// One-pole coefficient `exp(-1 / (tau * sr))` for a time constant in ms.
///
/// A zero or negative time constant yields 0 (the filter follows instantly).
#[inline]
pub fn time_constant_coeff(ms: f32, sample_rate: f32) -> f32 {
    let tau_samples = ms * 0.001 * sample_rate;
    if tau_samples > 0.0 {
        (-1.0 / tau_samples).exp()
    } else {
        0.0
    }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Flushes NaN and infinities to zero.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_to_db_floor() {
        assert_eq!(gain_to_db(0.0, MIN_DB), MIN_DB);
        assert_eq!(gain_to_db(-1.0, MIN_DB), MIN_DB);
        assert_eq!(gain_to_db(1e-9, MIN_DB), MIN_DB);
        assert!((gain_to_db(1.0, MIN_DB)).abs() < 1e-6);
        assert!((gain_to_db(0.1, MIN_DB) + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_gain(6.0) - 1.995_262).abs() < 1e-4);
    }

    #[test]
    fn test_time_constant_coeff() {
        let a = time_constant_coeff(10.0, 48000.0);
        assert!(a > 0.99 && a < 1.0);
        // Slower time constant -> coefficient closer to one.
        assert!(time_constant_coeff(100.0, 48000.0) > a);
        assert_eq!(time_constant_coeff(0.0, 48000.0), 0.0);
        assert_eq!(time_constant_coeff(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(0.25), 0.25);
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_lerp_clamps() {
        assert_eq!(lerp(500.0, 5.0, 0.0), 500.0);
        assert_eq!(lerp(500.0, 5.0, 1.0), 5.0);
        assert_eq!(lerp(500.0, 5.0, 2.0), 5.0);
    }
}
