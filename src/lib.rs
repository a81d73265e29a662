pub mod diagnostics;
pub mod dsp;
pub mod macro_controller;
pub mod meters;
pub mod presets;
pub mod rider;
pub mod settings;
pub mod visual;

pub use crate::meters::RiderMeters;
pub use crate::presets::{PresetManager, RiderPreset};
pub use crate::rider::VocalRider;
pub use crate::settings::{DetectorSource, RiderSettings};
pub use crate::visual::{VisualColumn, VisualFeed, WaveformHistory};

use crate::dsp::rms::{MAX_WINDOW_MS, MIN_WINDOW_MS};
use crate::settings::{MAX_RANGE_DB, MAX_TARGET_DB, MIN_TARGET_DB};
use crate::visual::REFRESH_RATE_HZ;
use nih_plug::prelude::*;
use std::sync::{Arc, Mutex};

const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------
#[derive(Params)]
pub struct RiderParams {
    #[id = "target_level"]
    pub target_level: FloatParam,

    #[id = "boost_range"]
    pub boost_range: FloatParam,

    #[id = "cut_range"]
    pub cut_range: FloatParam,

    #[id = "rms_window"]
    pub rms_window: FloatParam,

    #[id = "attack"]
    pub attack: FloatParam,

    #[id = "release"]
    pub release: FloatParam,

    #[id = "hold"]
    pub hold: FloatParam,

    // -------------------------------------------------------------------------
    // SPEED MACRO
    // -------------------------------------------------------------------------
    /// When on, `speed` drives attack and release.
    #[id = "use_speed"]
    pub use_speed: BoolParam,

    #[id = "speed"]
    pub speed: FloatParam,

    #[id = "detector_source"]
    pub detector_source: EnumParam<DetectorSource>,
}

// Helper to format values as "50%" for the DAW display
fn format_percent(v: f32) -> String {
    format!("{:.0}%", v)
}

// Helper to format gain in dB
fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

fn format_ms(v: f32) -> String {
    format!("{:.0} ms", v)
}

impl RiderParams {
    fn new(defaults: &RiderSettings) -> Self {
        Self {
            target_level: FloatParam::new(
                "Target Level",
                defaults.target_level_db,
                FloatRange::Linear {
                    min: MIN_TARGET_DB,
                    max: MAX_TARGET_DB,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            boost_range: FloatParam::new(
                "Boost Range",
                defaults.boost_range_db,
                FloatRange::Linear {
                    min: 0.0,
                    max: MAX_RANGE_DB,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            cut_range: FloatParam::new(
                "Cut Range",
                defaults.cut_range_db,
                FloatRange::Linear {
                    min: 0.0,
                    max: MAX_RANGE_DB,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            rms_window: FloatParam::new(
                "RMS Window",
                defaults.rms_window_ms,
                FloatRange::Linear {
                    min: MIN_WINDOW_MS,
                    max: MAX_WINDOW_MS,
                },
            )
            .with_value_to_string(Arc::new(format_ms)),

            attack: FloatParam::new(
                "Attack",
                defaults.attack_ms,
                FloatRange::Skewed {
                    min: 1.0,
                    max: 1000.0,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_value_to_string(Arc::new(format_ms)),

            release: FloatParam::new(
                "Release",
                defaults.release_ms,
                FloatRange::Skewed {
                    min: 1.0,
                    max: 2000.0,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_value_to_string(Arc::new(format_ms)),

            hold: FloatParam::new(
                "Hold",
                defaults.hold_ms,
                FloatRange::Linear {
                    min: 0.0,
                    max: 500.0,
                },
            )
            .with_value_to_string(Arc::new(format_ms)),

            use_speed: BoolParam::new("Use Speed", defaults.speed_percent.is_some()),

            speed: FloatParam::new(
                "Speed",
                defaults.speed_percent.unwrap_or(50.0),
                FloatRange::Linear {
                    min: 0.0,
                    max: 100.0,
                },
            )
            .with_value_to_string(Arc::new(format_percent)),

            detector_source: EnumParam::new("Detector", defaults.detector_source),
        }
    }

    /// Current parameter values as rider settings.
    pub fn to_settings(&self) -> RiderSettings {
        RiderSettings {
            target_level_db: self.target_level.value(),
            boost_range_db: self.boost_range.value(),
            cut_range_db: self.cut_range.value(),
            rms_window_ms: self.rms_window.value(),
            attack_ms: self.attack.value(),
            release_ms: self.release.value(),
            hold_ms: self.hold.value(),
            speed_percent: if self.use_speed.value() {
                Some(self.speed.value())
            } else {
                None
            },
            detector_source: self.detector_source.value(),
        }
    }
}

impl Default for RiderParams {
    fn default() -> Self {
        Self::new(&PresetManager::new().settings(RiderPreset::Default))
    }
}

// -----------------------------------------------------------------------------
// BACKGROUND TASKS
// -----------------------------------------------------------------------------
/// Work the audio thread hands off to the background thread.
#[derive(Debug, Clone, Copy)]
pub enum RiderTask {
    /// Drain the visual feed; `dt_seconds` since the previous tick.
    TickFeed { dt_seconds: f32 },
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
pub struct VocalRiderPlugin {
    params: Arc<RiderParams>,
    rider: VocalRider,
    /// Drained off the audio thread only.
    feed: Arc<Mutex<VisualFeed>>,
    applied_settings: RiderSettings,
    sample_rate: f32,
    samples_since_tick: usize,
}

impl Default for VocalRiderPlugin {
    fn default() -> Self {
        let params = Arc::new(RiderParams::default());
        let applied_settings = params.to_settings();
        let (rider, feed) = VocalRider::new(&applied_settings);
        Self {
            params,
            rider,
            feed: Arc::new(Mutex::new(feed)),
            applied_settings,
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples_since_tick: 0,
        }
    }
}

impl VocalRiderPlugin {
    /// Meter snapshots for an editor or host display.
    pub fn meters(&self) -> RiderMeters {
        self.rider.meters()
    }

    /// Shared handle to the visual feed, for an editor timer.
    pub fn feed(&self) -> Arc<Mutex<VisualFeed>> {
        self.feed.clone()
    }

    fn sync_params(&mut self) {
        let settings = self.params.to_settings();
        if settings != self.applied_settings {
            self.rider.apply_settings(&settings);
            self.applied_settings = settings;
        }
    }

    fn process_internal(
        &mut self,
        buffer: &mut Buffer,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.sync_params();
        self.rider.process_in_place(buffer.as_slice());

        self.samples_since_tick += buffer.samples();
        let tick_interval = (self.sample_rate / REFRESH_RATE_HZ) as usize;
        if self.samples_since_tick >= tick_interval {
            let dt_seconds = self.samples_since_tick as f32 / self.sample_rate;
            context.execute_background(RiderTask::TickFeed { dt_seconds });
            self.samples_since_tick = 0;
        }

        ProcessStatus::Normal
    }
}

impl Plugin for VocalRiderPlugin {
    const NAME: &'static str = "Vocal Rider";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = RiderTask;

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.sample_rate = buffer_config.sample_rate;
            self.applied_settings = self.params.to_settings();
            self.rider.apply_settings(&self.applied_settings);
            self.rider.prepare(
                buffer_config.sample_rate,
                buffer_config.max_buffer_size as usize,
            );
            self.samples_since_tick = 0;
            true
        }))
        .unwrap_or(false)
    }

    fn task_executor(&mut self) -> TaskExecutor<Self> {
        let feed = self.feed.clone();
        Box::new(move |task| match task {
            RiderTask::TickFeed { dt_seconds } => {
                // A busy editor holds the lock; the next tick catches up.
                if let Ok(mut feed) = feed.try_lock() {
                    feed.tick(dt_seconds);
                }
            }
        })
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer, context)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.rider.reset();
            self.samples_since_tick = 0;
        }))
        .unwrap_or(());
    }
}

impl ClapPlugin for VocalRiderPlugin {
    const CLAP_ID: &'static str = "com.andrzej.vocal-rider";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("Automatic vocal level rider");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Utility,
        ClapFeature::Mono,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for VocalRiderPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"VocalRider_Core1";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Dynamics,
    ];
}

nih_export_clap!(VocalRiderPlugin);
nih_export_vst3!(VocalRiderPlugin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_defaults_match_settings() {
        let params = RiderParams::default();
        assert_eq!(params.to_settings(), RiderSettings::default());
    }

    #[test]
    fn test_speed_toggle() {
        let settings = RiderSettings {
            speed_percent: Some(25.0),
            ..RiderSettings::default()
        };
        let params = RiderParams::new(&settings);
        assert!(params.use_speed.value());
        assert_eq!(params.to_settings().speed_percent, Some(25.0));
    }
}
