//! Rider configuration.
//!
//! Plain values in SI units, serialisable to JSON. The plugin's parameter
//! tree and the factory presets both funnel through [`RiderSettings`] before
//! reaching the orchestrator.

use crate::dsp::gain_smoother::{DEFAULT_ATTACK_MS, DEFAULT_HOLD_MS, DEFAULT_RELEASE_MS};
use crate::dsp::rms::{DEFAULT_WINDOW_MS, MAX_WINDOW_MS, MIN_WINDOW_MS};
use anyhow::Context;
use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};

pub const MIN_TARGET_DB: f32 = -60.0;
pub const MAX_TARGET_DB: f32 = 0.0;
pub const DEFAULT_TARGET_DB: f32 = -18.0;

pub const MAX_RANGE_DB: f32 = 24.0;
pub const DEFAULT_RANGE_DB: f32 = 12.0;

/// Which signal feeds the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum DetectorSource {
    #[serde(rename = "First Channel")]
    #[name = "First Channel"]
    FirstChannel,
    #[serde(rename = "Mono Sum")]
    #[name = "Mono Sum"]
    MonoSum,
}

impl Default for DetectorSource {
    fn default() -> Self {
        DetectorSource::FirstChannel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderSettings {
    pub target_level_db: f32,
    pub boost_range_db: f32,
    pub cut_range_db: f32,
    pub rms_window_ms: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub hold_ms: f32,
    /// When set, overrides `attack_ms` and `release_ms`.
    pub speed_percent: Option<f32>,
    pub detector_source: DetectorSource,
}

impl Default for RiderSettings {
    fn default() -> Self {
        Self {
            target_level_db: DEFAULT_TARGET_DB,
            boost_range_db: DEFAULT_RANGE_DB,
            cut_range_db: DEFAULT_RANGE_DB,
            rms_window_ms: DEFAULT_WINDOW_MS,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
            hold_ms: DEFAULT_HOLD_MS,
            speed_percent: None,
            detector_source: DetectorSource::FirstChannel,
        }
    }
}

impl RiderSettings {
    /// Returns a copy with every field inside its control range.
    ///
    /// Non-finite fields fall back to their defaults.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            target_level_db: finite_or(self.target_level_db, d.target_level_db)
                .clamp(MIN_TARGET_DB, MAX_TARGET_DB),
            boost_range_db: finite_or(self.boost_range_db, d.boost_range_db)
                .clamp(0.0, MAX_RANGE_DB),
            cut_range_db: finite_or(self.cut_range_db, d.cut_range_db).clamp(0.0, MAX_RANGE_DB),
            rms_window_ms: finite_or(self.rms_window_ms, d.rms_window_ms)
                .clamp(MIN_WINDOW_MS, MAX_WINDOW_MS),
            attack_ms: finite_or(self.attack_ms, d.attack_ms).max(1.0),
            release_ms: finite_or(self.release_ms, d.release_ms).max(1.0),
            hold_ms: finite_or(self.hold_ms, d.hold_ms).max(0.0),
            speed_percent: self
                .speed_percent
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, 100.0)),
            detector_source: self.detector_source,
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let settings: Self =
            serde_json::from_str(json).context("failed to parse rider settings")?;
        Ok(settings.clamped())
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialise rider settings")
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
