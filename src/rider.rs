//! Vocal Rider orchestrator
//!
//! # Perceptual Contract
//! - **Target Source**: One detector signal per block (first channel or mono
//!   sum), measured by a sliding RMS window.
//! - **Intended Effect**: Keep the vocal sitting at the target level by
//!   riding a single smoothed gain, applied identically to every channel.
//! - **Failure Modes**:
//!   - Windows much longer than a syllable make the rider late on phrase
//!     starts.
//!   - Hold longer than the gap between words makes the rider stick.
//! - **Will Not Do**:
//!   - Look ahead or add latency.
//!   - Process channels independently.
//!
//! # Per-sample flow
//! ```text
//! x ─► RMS (A) ──► target gain ─► hold gate ─► smoother (C) ─► gain ─► y
//!  └─► peak (B)                                                   │
//!                                     output RMS + column feed ◄──┘
//! ```
//!
//! Level snapshots of A, B and the output meter are published once per
//! block; the gain is published every sample.

use crate::diagnostics::{event_channel, EventSender};
use crate::dsp::utils::{db_to_gain, SILENCE_THRESHOLD_DB};
use crate::dsp::{
    calculate_target_gain_asymmetric, GainShared, GainSmoother, PeakDetector, RmsDetector,
};
use crate::meters::RiderMeters;
use crate::settings::{
    DetectorSource, RiderSettings, MAX_RANGE_DB, MAX_TARGET_DB, MIN_TARGET_DB,
};
use crate::visual::{
    column_channel, ColumnAccumulator, ColumnProducer, VisualFeed, DEFAULT_QUEUE_CAPACITY,
};
use log::{info, warn};
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

pub struct VocalRider {
    settings: RiderSettings,
    sample_rate: f32,
    max_block_size: usize,

    input_rms: RmsDetector,
    input_peak: PeakDetector,
    smoother: GainSmoother,
    output_rms: RmsDetector,

    accumulator: ColumnAccumulator,
    columns: ColumnProducer,
    events: EventSender,
}

impl VocalRider {
    /// Builds a rider and the UI-side feed that drains it.
    ///
    /// The rider runs at 48 kHz until [`VocalRider::prepare`] is called.
    pub fn new(settings: &RiderSettings) -> (Self, VisualFeed) {
        let settings = settings.clamped();
        let (columns, column_consumer) = column_channel(DEFAULT_QUEUE_CAPACITY);
        let (events, event_receiver) = event_channel();

        let mut rider = Self {
            settings,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: 0,
            input_rms: RmsDetector::new(DEFAULT_SAMPLE_RATE, settings.rms_window_ms),
            input_peak: PeakDetector::new(DEFAULT_SAMPLE_RATE),
            smoother: GainSmoother::new(DEFAULT_SAMPLE_RATE),
            output_rms: RmsDetector::new(DEFAULT_SAMPLE_RATE, settings.rms_window_ms),
            accumulator: ColumnAccumulator::new(),
            columns,
            events,
        };
        rider.apply_ballistics();

        (rider, VisualFeed::new(column_consumer, event_receiver))
    }

    /// Configures every detector for a new sample rate and clears all state.
    ///
    /// Invalid arguments leave the rider as it was.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() || max_block_size == 0 {
            warn!(
                "ignoring prepare with sample rate {} and max block size {}",
                sample_rate, max_block_size
            );
            return;
        }

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        let window_ms = self.settings.rms_window_ms;
        self.input_rms.prepare(sample_rate, window_ms);
        self.input_peak.prepare(sample_rate);
        self.smoother.prepare(sample_rate);
        self.output_rms.prepare(sample_rate, window_ms);
        self.accumulator.reset();

        info!(
            "vocal rider prepared: {} Hz, max block {}, window {} ms, hold {} samples",
            sample_rate,
            max_block_size,
            window_ms,
            self.smoother.shared().hold_samples()
        );
    }

    /// Clears detector history and the pending column. Idempotent.
    pub fn reset(&mut self) {
        self.input_rms.reset();
        self.input_peak.reset();
        self.smoother.reset();
        self.output_rms.reset();
        self.accumulator.reset();
    }

    /// Processes separate input and output buffers.
    ///
    /// Inputs are copied into the outputs first, then processed in place.
    pub fn process_block(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let channels = inputs.len().min(outputs.len());
        for (output, input) in outputs.iter_mut().zip(inputs.iter()) {
            let n = output.len().min(input.len());
            output[..n].copy_from_slice(&input[..n]);
        }
        self.process_in_place(&mut outputs[..channels]);
    }

    /// Processes a block in place. Only the first `min(len)` samples of each
    /// channel are touched.
    pub fn process_in_place(&mut self, channels: &mut [&mut [f32]]) {
        let num_channels = channels.len();
        let num_samples = match channels.iter().map(|c| c.len()).min() {
            Some(n) => n,
            None => return,
        };
        let mono_scale = 1.0 / num_channels as f32;

        let target = self.settings.target_level_db;
        let boost = self.settings.boost_range_db;
        let cut = self.settings.cut_range_db;
        let source = self.settings.detector_source;

        for i in 0..num_samples {
            let detector_in = match source {
                DetectorSource::FirstChannel => channels[0][i],
                DetectorSource::MonoSum => {
                    channels.iter().map(|c| c[i]).sum::<f32>() * mono_scale
                }
            };
            let x = if detector_in.is_finite() {
                detector_in
            } else {
                0.0
            };

            let level_db = self.input_rms.next_level_db(x);
            self.input_peak.next_level_db(x);

            let raw_db = calculate_target_gain_asymmetric(level_db, target, boost, cut);
            let gain_db = self.smoother.process_sample(raw_db);
            let gain = db_to_gain(gain_db);

            for channel in channels.iter_mut() {
                let y = channel[i] * gain;
                channel[i] = if y.is_finite() {
                    y
                } else {
                    self.events.note_non_finite();
                    0.0
                };
            }

            let y = x * gain;
            self.output_rms.next_level_db(y);
            if let Some(column) = self.accumulator.push(x, y, gain_db) {
                if self.columns.push(column) {
                    self.events.note_column_overwritten();
                }
            }
        }

        self.input_rms.publish();
        self.input_peak.publish();
        self.output_rms.publish();
        self.events.flush();
    }

    // -------------------------------------------------------------------------
    // CONTROLS
    // -------------------------------------------------------------------------

    pub fn set_target_level_db(&mut self, db: f32) {
        if db.is_finite() {
            self.settings.target_level_db = db.clamp(MIN_TARGET_DB, MAX_TARGET_DB);
        }
    }

    pub fn set_boost_range_db(&mut self, db: f32) {
        if db.is_finite() {
            self.settings.boost_range_db = db.clamp(0.0, MAX_RANGE_DB);
        }
    }

    pub fn set_cut_range_db(&mut self, db: f32) {
        if db.is_finite() {
            self.settings.cut_range_db = db.clamp(0.0, MAX_RANGE_DB);
        }
    }

    /// Resizes both RMS windows. Changes under 0.01 ms are ignored, real
    /// changes discard the window history.
    pub fn set_rms_window_ms(&mut self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.input_rms.set_window_size(ms);
        self.output_rms.set_window_size(ms);
        self.settings.rms_window_ms = self.input_rms.window_ms();
    }

    /// Sets the smoother attack and leaves speed-macro control.
    pub fn set_attack_ms(&mut self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.smoother.set_attack_ms(ms);
        self.settings.attack_ms = self.smoother.shared().attack_ms();
        self.settings.speed_percent = None;
    }

    /// Sets the smoother release and leaves speed-macro control.
    pub fn set_release_ms(&mut self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.smoother.set_release_ms(ms);
        self.settings.release_ms = self.smoother.shared().release_ms();
        self.settings.speed_percent = None;
    }

    pub fn set_hold_ms(&mut self, ms: f32) {
        if !ms.is_finite() {
            return;
        }
        self.smoother.set_hold_ms(ms);
        self.settings.hold_ms = self.smoother.shared().hold_ms();
    }

    /// Derives attack and release from the speed macro.
    pub fn set_speed(&mut self, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        self.smoother.set_speed(percent);
        let shared = self.smoother.shared();
        self.settings.attack_ms = shared.attack_ms();
        self.settings.release_ms = shared.release_ms();
        self.settings.speed_percent = Some(percent);
    }

    pub fn set_detector_source(&mut self, source: DetectorSource) {
        self.settings.detector_source = source;
    }

    /// Applies a whole settings block. Unchanged values are no-ops.
    pub fn apply_settings(&mut self, settings: &RiderSettings) {
        let settings = settings.clamped();
        self.settings.target_level_db = settings.target_level_db;
        self.settings.boost_range_db = settings.boost_range_db;
        self.settings.cut_range_db = settings.cut_range_db;
        self.settings.attack_ms = settings.attack_ms;
        self.settings.release_ms = settings.release_ms;
        self.settings.hold_ms = settings.hold_ms;
        self.settings.speed_percent = settings.speed_percent;
        self.settings.detector_source = settings.detector_source;
        self.set_rms_window_ms(settings.rms_window_ms);
        self.apply_ballistics();
    }

    fn apply_ballistics(&mut self) {
        let s = self.settings;
        match s.speed_percent {
            Some(percent) => self.set_speed(percent),
            None => {
                self.smoother.set_attack_ms(s.attack_ms);
                self.smoother.set_release_ms(s.release_ms);
            }
        }
        self.smoother.set_hold_ms(s.hold_ms);
    }

    // -------------------------------------------------------------------------
    // STATE
    // -------------------------------------------------------------------------

    /// The settings currently in effect, clamped.
    pub fn settings(&self) -> RiderSettings {
        self.settings
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Input level is above the silence threshold.
    pub fn is_riding(&self) -> bool {
        self.input_rms.current_level_db() >= SILENCE_THRESHOLD_DB
    }

    pub fn meters(&self) -> RiderMeters {
        RiderMeters {
            input_rms: self.input_rms.shared(),
            input_peak: self.input_peak.shared(),
            gain: self.smoother.shared(),
            output_rms: self.output_rms.shared(),
        }
    }

    pub fn gain_shared(&self) -> Arc<GainShared> {
        self.smoother.shared()
    }

    pub fn current_gain_db(&self) -> f32 {
        self.smoother.current_gain_db()
    }
}
