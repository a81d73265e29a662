//! Gain Smoother (the rider's gain computer)
//!
//! # Perceptual Contract
//! - **Target Source**: Windowed RMS level of the vocal.
//! - **Intended Effect**: Push the measured level toward the target, within
//!   the allowed boost and cut, without pumping between syllables.
//! - **Failure Modes**:
//!   - Audible breathing if release is too fast for the material.
//!   - Late catch of phrase starts if attack is too slow.
//! - **Will Not Do**:
//!   - Ride silence (below -60 dBFS the raw target is 0 dB).
//!   - Look ahead.
//!
//! # Signal Flow
//! 1. [`calculate_target_gain_asymmetric`] turns (level, target, ranges) into
//!    a raw target gain in dB.
//! 2. [`HoldGate`] freezes downward moves of that target for `hold_samples`.
//! 3. A one-pole filter in the dB domain with separate attack (gain rising)
//!    and release (gain falling) coefficients produces the applied gain.
//!
//! The gate sits upstream of the smoother and is tuned independently; the
//! release coefficient alone shapes the decay once the gate lets go.

use crate::dsp::utils::{db_to_gain, time_constant_coeff, SILENCE_THRESHOLD_DB};
use crate::macro_controller::speed_to_ballistics;
use crate::meters::AtomicF32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const DEFAULT_ATTACK_MS: f32 = 50.0;
pub const DEFAULT_RELEASE_MS: f32 = 200.0;
pub const DEFAULT_HOLD_MS: f32 = 0.0;

const MIN_BALLISTIC_MS: f32 = 1.0;

// Below this distance the smoother lands exactly on its target.
const SNAP_EPSILON_DB: f32 = 1e-6;

/// Raw target gain for a symmetric range.
///
/// Returns 0 dB below the silence threshold, otherwise
/// `clamp(target - level, -range, +range)`.
#[inline]
pub fn calculate_target_gain(current_level_db: f32, target_level_db: f32, range_db: f32) -> f32 {
    calculate_target_gain_asymmetric(current_level_db, target_level_db, range_db, range_db)
}

/// Raw target gain with independent boost and cut limits.
#[inline]
pub fn calculate_target_gain_asymmetric(
    current_level_db: f32,
    target_level_db: f32,
    boost_range_db: f32,
    cut_range_db: f32,
) -> f32 {
    if current_level_db < SILENCE_THRESHOLD_DB {
        return 0.0;
    }
    let boost = boost_range_db.max(0.0);
    let cut = cut_range_db.max(0.0);
    (target_level_db - current_level_db).clamp(-cut, boost)
}

/// Which branch the hold gate took on its last sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldState {
    /// A downward move is being deferred; the previous target is substituted.
    Hold,
    /// The hold expired; the lower target was adopted.
    ReleaseOk,
    /// Target rising or hold disabled; passed straight through.
    Follow,
}

/// Defers downward moves of the raw target gain.
#[derive(Clone, Copy, Debug)]
pub struct HoldGate {
    counter: u32,
    last_target_db: f32,
    state: HoldState,
}

impl Default for HoldGate {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldGate {
    pub fn new() -> Self {
        Self {
            counter: 0,
            last_target_db: 0.0,
            state: HoldState::Follow,
        }
    }

    /// Returns the target the smoother should chase this sample.
    #[inline]
    pub fn process(&mut self, raw_db: f32, hold_samples: u32) -> f32 {
        // Keep 0 <= counter <= hold_samples when the hold time shrinks.
        self.counter = self.counter.min(hold_samples);

        if hold_samples > 0 && raw_db < self.last_target_db {
            if self.counter < hold_samples {
                self.counter += 1;
                self.state = HoldState::Hold;
                return self.last_target_db;
            }
            self.state = HoldState::ReleaseOk;
        } else {
            self.state = HoldState::Follow;
        }

        self.counter = 0;
        self.last_target_db = raw_db;
        raw_db
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn last_target_db(&self) -> f32 {
        self.last_target_db
    }
}

/// Ballistics and published gain of a [`GainSmoother`].
#[derive(Debug)]
pub struct GainShared {
    sample_rate: AtomicF32,
    attack_ms: AtomicF32,
    release_ms: AtomicF32,
    hold_ms: AtomicF32,
    attack_coeff: AtomicF32,
    release_coeff: AtomicF32,
    hold_samples: AtomicU32,
    gain_db: AtomicF32,
}

impl GainShared {
    fn new(sample_rate: f32) -> Self {
        let shared = Self {
            sample_rate: AtomicF32::new(sample_rate),
            attack_ms: AtomicF32::new(DEFAULT_ATTACK_MS),
            release_ms: AtomicF32::new(DEFAULT_RELEASE_MS),
            hold_ms: AtomicF32::new(DEFAULT_HOLD_MS),
            attack_coeff: AtomicF32::new(0.0),
            release_coeff: AtomicF32::new(0.0),
            hold_samples: AtomicU32::new(0),
            gain_db: AtomicF32::new(0.0),
        };
        shared.update_coefficients();
        shared
    }

    pub fn set_attack_ms(&self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.attack_ms.store(ms.max(MIN_BALLISTIC_MS));
        self.update_coefficients();
    }

    pub fn set_release_ms(&self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.release_ms.store(ms.max(MIN_BALLISTIC_MS));
        self.update_coefficients();
    }

    pub fn set_hold_ms(&self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.hold_ms.store(ms.max(0.0));
        self.update_coefficients();
    }

    /// Derives attack and release from a single 0..100 % control.
    pub fn set_speed(&self, percent: f32) {
        let (attack_ms, release_ms) = speed_to_ballistics(percent);
        self.attack_ms.store(attack_ms);
        self.release_ms.store(release_ms);
        self.update_coefficients();
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms.load()
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms.load()
    }

    pub fn hold_ms(&self) -> f32 {
        self.hold_ms.load()
    }

    pub fn attack_coeff(&self) -> f32 {
        self.attack_coeff.load()
    }

    pub fn release_coeff(&self) -> f32 {
        self.release_coeff.load()
    }

    pub fn hold_samples(&self) -> u32 {
        self.hold_samples.load(Ordering::Relaxed)
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.load()
    }

    pub fn gain_linear(&self) -> f32 {
        db_to_gain(self.gain_db())
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
        // Truncated, not rounded.
        let hold_samples = (self.hold_ms.load() * sr / 1000.0) as u32;
        self.hold_samples.store(hold_samples, Ordering::Relaxed);
    }
}

pub struct GainSmoother {
    shared: Arc<GainShared>,
    gate: HoldGate,
    smoothed_db: f32,
}

impl GainSmoother {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = if sample_rate > 0.0 && sample_rate.is_finite() {
            sample_rate
        } else {
            48000.0
        };
        Self {
            shared: Arc::new(GainShared::new(sample_rate)),
            gate: HoldGate::new(),
            smoothed_db: 0.0,
        }
    }

    /// Recomputes coefficients for `sample_rate` and resets state.
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
        self.gate.reset();
        self.smoothed_db = 0.0;
        self.shared.gain_db.store(0.0);
    }

    pub fn set_attack_ms(&self, ms: f32) {
        self.shared.set_attack_ms(ms);
    }

    pub fn set_release_ms(&self, ms: f32) {
        self.shared.set_release_ms(ms);
    }

    pub fn set_hold_ms(&self, ms: f32) {
        self.shared.set_hold_ms(ms);
    }

    pub fn set_speed(&self, percent: f32) {
        self.shared.set_speed(percent);
    }

    /// Runs one raw target through the hold gate and the smoother.
    ///
    /// The result is published every sample.
    #[inline]
    pub fn process_sample(&mut self, raw_target_db: f32) -> f32 {
        let target = self
            .gate
            .process(raw_target_db, self.shared.hold_samples.load(Ordering::Relaxed));

        let coeff = if target > self.smoothed_db {
            self.shared.attack_coeff.load()
        } else {
            self.shared.release_coeff.load()
        };
        self.smoothed_db = coeff * self.smoothed_db + (1.0 - coeff) * target;
        if (self.smoothed_db - target).abs() < SNAP_EPSILON_DB {
            self.smoothed_db = target;
        }

        self.shared.gain_db.store(self.smoothed_db);
        self.smoothed_db
    }

    pub fn current_gain_db(&self) -> f32 {
        self.shared.gain_db()
    }

    pub fn current_gain_linear(&self) -> f32 {
        self.shared.gain_linear()
    }

    pub fn hold_gate(&self) -> &HoldGate {
        &self.gate
    }

    pub fn shared(&self) -> Arc<GainShared> {
        self.shared.clone()
    }
}
