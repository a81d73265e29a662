//! Peak envelope follower.
//!
//! Fast-attack / slow-release one-pole filter on `|x|` in the linear domain,
//! reported in dB floored at [`MIN_DB`]:
//!
//! ```text
//! env = a * env + (1 - a) * |x|    a = attack if |x| > env else release
//! ```
//!
//! The envelope is flushed to zero below [`DENORMAL_FLOOR`] so the feedback
//! loop never runs on subnormals.

use crate::dsp::utils::{gain_to_db, time_constant_coeff, DENORMAL_FLOOR, MIN_DB};
use crate::meters::AtomicF32;
use std::sync::Arc;

pub const DEFAULT_ATTACK_MS: f32 = 1.0;
pub const DEFAULT_RELEASE_MS: f32 = 300.0;

const MIN_ATTACK_MS: f32 = 0.1;
const MIN_RELEASE_MS: f32 = 1.0;

/// Coefficients and published level of a [`PeakDetector`].
///
/// Setters may be called from any thread; the audio thread picks the new
/// coefficients up on its next sample.
#[derive(Debug)]
pub struct PeakShared {
    sample_rate: AtomicF32,
    attack_ms: AtomicF32,
    release_ms: AtomicF32,
    attack_coeff: AtomicF32,
    release_coeff: AtomicF32,
    level_db: AtomicF32,
}

impl PeakShared {
    fn new(sample_rate: f32) -> Self {
        let shared = Self {
            sample_rate: AtomicF32::new(sample_rate),
            attack_ms: AtomicF32::new(DEFAULT_ATTACK_MS),
            release_ms: AtomicF32::new(DEFAULT_RELEASE_MS),
            attack_coeff: AtomicF32::new(0.0),
            release_coeff: AtomicF32::new(0.0),
            level_db: AtomicF32::new(MIN_DB),
        };
        shared.update_coefficients();
        shared
    }

    pub fn set_attack_ms(&self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.attack_ms.store(ms.max(MIN_ATTACK_MS));
        self.update_coefficients();
    }

    pub fn set_release_ms(&self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.release_ms.store(ms.max(MIN_RELEASE_MS));
        self.update_coefficients();
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms.load()
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms.load()
    }

    pub fn attack_coeff(&self) -> f32 {
        self.attack_coeff.load()
    }

    pub fn release_coeff(&self) -> f32 {
        self.release_coeff.load()
    }

    pub fn level_db(&self) -> f32 {
        self.level_db.load()
    }

    fn set_sample_rate(&self, sample_rate: f32) {
        self.sample_rate.store(sample_rate);
        self.update_coefficients();
    }

    fn update_coefficients(&self) {
        let sr = self.sample_rate.load();
        self.attack_coeff
            .store(time_constant_coeff(self.attack_ms.load(), sr));
        self.release_coeff
            .store(time_constant_coeff(self.release_ms.load(), sr));
    }
}

pub struct PeakDetector {
    shared: Arc<PeakShared>,
    envelope: f32,
}

impl PeakDetector {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = if sample_rate > 0.0 && sample_rate.is_finite() {
            sample_rate
        } else {
            48000.0
        };
        Self {
            shared: Arc::new(PeakShared::new(sample_rate)),
            envelope: 0.0,
        }
    }

    /// Recomputes coefficients for `sample_rate` and resets the envelope.
    ///
    /// A non-positive or non-finite sample rate is ignored.
    pub fn prepare(&mut self, sample_rate: f32) {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return;
        }
        self.shared.set_sample_rate(sample_rate);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.shared.level_db.store(MIN_DB);
    }

    pub fn set_attack_ms(&self, ms: f32) {
        self.shared.set_attack_ms(ms);
    }

    pub fn set_release_ms(&self, ms: f32) {
        self.shared.set_release_ms(ms);
    }

    /// Advances the envelope by one sample without publishing.
    #[inline]
    pub fn next_level_db(&mut self, x: f32) -> f32 {
        let x_abs = x.abs();
        let coeff = if x_abs > self.envelope {
            self.shared.attack_coeff.load()
        } else {
            self.shared.release_coeff.load()
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * x_abs;
        if self.envelope < DENORMAL_FLOOR {
            self.envelope = 0.0;
        }
        self.level_db()
    }

    pub fn process_sample(&mut self, x: f32) -> f32 {
        let db = self.next_level_db(x);
        self.publish();
        db
    }

    /// Same per-sample update, but the level is published once at block end.
    pub fn process_block(&mut self, xs: &[f32]) -> f32 {
        for &x in xs {
            self.next_level_db(x);
        }
        self.publish();
        self.level_db()
    }

    #[inline]
    pub fn publish(&self) {
        self.shared.level_db.store(self.level_db());
    }

    /// Current envelope in linear units.
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    pub fn current_level_db(&self) -> f32 {
        self.shared.level_db()
    }

    pub fn shared(&self) -> Arc<PeakShared> {
        self.shared.clone()
    }

    #[inline]
    fn level_db(&self) -> f32 {
        gain_to_db(self.envelope, MIN_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_converges_monotonically() {
        let mut det = PeakDetector::new(48000.0);
        let mut prev = 0.0;
        for _ in 0..48000 {
            det.next_level_db(-0.5);
            let env = det.envelope();
            assert!(env >= prev - 1e-6);
            assert!(env <= 0.5 + 1e-6);
            prev = env;
        }
        assert!((det.envelope() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_attack_faster_than_release() {
        let mut det = PeakDetector::new(48000.0);
        for _ in 0..480 {
            det.next_level_db(1.0);
        }
        // 10 ms at a 1 ms attack: essentially settled
        assert!(det.envelope() > 0.99);

        for _ in 0..480 {
            det.next_level_db(0.0);
        }
        // 10 ms at a 300 ms release: barely moved
        assert!(det.envelope() > 0.9);
    }

    #[test]
    fn test_denormal_snap() {
        let mut det = PeakDetector::new(48000.0);
        det.set_release_ms(1.0);
        det.next_level_db(1e-3);
        for _ in 0..48000 {
            det.next_level_db(0.0);
        }
        assert_eq!(det.envelope(), 0.0);
        assert_eq!(det.process_sample(0.0), MIN_DB);
    }

    #[test]
    fn test_time_constants_are_clamped() {
        let det = PeakDetector::new(48000.0);
        det.set_attack_ms(0.0);
        assert_eq!(det.shared().attack_ms(), 0.1);
        det.set_release_ms(-5.0);
        assert_eq!(det.shared().release_ms(), 1.0);
        det.set_release_ms(f32::NAN);
        assert_eq!(det.shared().release_ms(), 1.0);
    }

    #[test]
    fn test_coefficients_follow_sample_rate() {
        let mut det = PeakDetector::new(44100.0);
        let at_44k = det.shared().release_coeff();
        det.prepare(96000.0);
        let at_96k = det.shared().release_coeff();
        assert!(at_96k > at_44k);
        assert_eq!(at_96k, time_constant_coeff(DEFAULT_RELEASE_MS, 96000.0));

        det.prepare(0.0);
        assert_eq!(det.shared().release_coeff(), at_96k);
    }

    #[test]
    fn test_block_publishes_at_end() {
        let mut det = PeakDetector::new(48000.0);
        let block = [0.5f32; 256];
        let level = det.process_block(&block);
        assert_eq!(det.current_level_db(), level);

        det.next_level_db(0.9);
        assert_eq!(det.current_level_db(), level);
    }

    #[test]
    fn test_reset() {
        let mut det = PeakDetector::new(48000.0);
        det.process_sample(0.8);
        det.reset();
        assert_eq!(det.envelope(), 0.0);
        assert_eq!(det.current_level_db(), MIN_DB);
        det.reset();
        assert_eq!(det.envelope(), 0.0);
    }
}
