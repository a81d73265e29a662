//! Thread-safe metering for the rider.
//!
//! Every published value is a single f32 stored as bits in an `AtomicU32`
//! with relaxed ordering. The audio thread writes, the UI reads; there is no
//! synchronization beyond the atomic itself.

use crate::dsp::{GainShared, PeakShared, RmsShared};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// An `f32` that can be shared between the audio and UI threads.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(val: f32) -> Self {
        Self(AtomicU32::new(val.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, val: f32) {
        self.0.store(val.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Read-only view of everything the rider publishes.
///
/// Cheap to clone; hand one to each meter or editor that needs it.
#[derive(Clone)]
pub struct RiderMeters {
    pub(crate) input_rms: Arc<RmsShared>,
    pub(crate) input_peak: Arc<PeakShared>,
    pub(crate) gain: Arc<GainShared>,
    pub(crate) output_rms: Arc<RmsShared>,
}

impl RiderMeters {
    pub fn input_rms_db(&self) -> f32 {
        self.input_rms.level_db()
    }

    pub fn input_peak_db(&self) -> f32 {
        self.input_peak.level_db()
    }

    pub fn output_rms_db(&self) -> f32 {
        self.output_rms.level_db()
    }

    /// Applied gain in dB, updated every sample.
    pub fn gain_db(&self) -> f32 {
        self.gain.gain_db()
    }

    pub fn gain_linear(&self) -> f32 {
        self.gain.gain_linear()
    }
}
