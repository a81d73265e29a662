use crate::settings::RiderSettings;
use log::warn;
use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// RIDER FACTORY PRESETS
// =============================================================================

/// Factory starting points for common vocal material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum RiderPreset {
    #[serde(rename = "Default")]
    #[name = "Default"]
    Default,
    #[serde(rename = "Gentle Podcast")]
    #[name = "Gentle Podcast"]
    GentlePodcast,
    #[serde(rename = "Tight Vocal")]
    #[name = "Tight Vocal"]
    TightVocal,
    #[serde(rename = "Spoken Word")]
    #[name = "Spoken Word"]
    SpokenWord,
    #[serde(rename = "Broadcast")]
    #[name = "Broadcast"]
    Broadcast,
}

impl RiderPreset {
    pub fn all_presets() -> [RiderPreset; 5] {
        [
            RiderPreset::Default,
            RiderPreset::GentlePodcast,
            RiderPreset::TightVocal,
            RiderPreset::SpokenWord,
            RiderPreset::Broadcast,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiderPreset::Default => "Default",
            RiderPreset::GentlePodcast => "Gentle Podcast",
            RiderPreset::TightVocal => "Tight Vocal",
            RiderPreset::SpokenWord => "Spoken Word",
            RiderPreset::Broadcast => "Broadcast",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiderPreset::Default => "Balanced riding toward -18 dBFS",
            RiderPreset::GentlePodcast => "Slow, narrow riding with a long hold between phrases",
            RiderPreset::TightVocal => "Fast riding for sung vocals in a dense mix",
            RiderPreset::SpokenWord => "Extra boost for quiet talkers, mono detection",
            RiderPreset::Broadcast => "Lower target with generous cut for loud hosts",
        }
    }
}

impl Default for RiderPreset {
    fn default() -> Self {
        RiderPreset::Default
    }
}

#[derive(Debug)]
pub struct PresetManager {
    presets: HashMap<String, RiderSettings>,
}

impl PresetManager {
    /// Load presets from baked-in JSON. This is fallible but non-fatal:
    /// a malformed file leaves only the "Default" preset.
    pub fn new() -> Self {
        Self::from_json_or_default(include_str!("../presets.json"))
    }

    pub fn from_json_or_default(json: &str) -> Self {
        match serde_json::from_str::<HashMap<String, RiderSettings>>(json) {
            Ok(presets) => Self {
                presets: presets
                    .into_iter()
                    .map(|(name, settings)| (name, settings.clamped()))
                    .collect(),
            },
            Err(e) => {
                warn!("factory presets unreadable, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn get_preset_values(&self, preset_name: &str) -> Option<&RiderSettings> {
        self.presets.get(preset_name)
    }

    /// Settings for `preset`, or the defaults if it is missing.
    pub fn settings(&self, preset: RiderPreset) -> RiderSettings {
        self.get_preset_values(preset.name())
            .copied()
            .unwrap_or_default()
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        let mut presets = HashMap::new();
        presets.insert(
            RiderPreset::Default.name().to_string(),
            RiderSettings::default(),
        );
        Self { presets }
    }
}
