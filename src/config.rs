//! Engine configuration and the settings push contract.
//!
//! The surrounding configuration layer owns persistence and file watching;
//! this crate only consumes pushed values. [`AudioSettings`] is the full
//! snapshot payload; the per-field `on_*` entry points on the engine cover
//! incremental changes.

use serde::{Deserialize, Serialize};

use crate::dsp::equalizer::{BAND_COUNT, EqPreset};
use crate::scheduler::DEFAULT_MAX_VOICES;

/// Host configuration fixed at engine construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub output_channels: u16,
    /// Ceiling on simultaneous one-shot voices.
    pub max_voices: usize,
    /// Start in the suspended-until-gesture state (browser-style hosts).
    pub start_suspended: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            output_channels: 2,
            max_voices: DEFAULT_MAX_VOICES,
            start_suspended: false,
        }
    }
}

/// User-facing mixer settings, pushed in whole by the configuration layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    pub master_volume: f64,
    pub sfx_volume: f64,
    pub music_volume: f64,
    pub muted: bool,
    pub compressor_enabled: bool,
    pub reverb_enabled: bool,
    pub equalizer_enabled: bool,
    /// Applied before `eq_gains`, which may then override single bands.
    pub eq_preset: Option<EqPreset>,
    pub eq_gains: Option<[f64; BAND_COUNT]>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            muted: false,
            compressor_enabled: false,
            reverb_enabled: false,
            equalizer_enabled: false,
            eq_preset: None,
            eq_gains: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_json() {
        let settings = AudioSettings {
            master_volume: 0.8,
            music_volume: 0.5,
            muted: true,
            equalizer_enabled: true,
            eq_preset: Some(EqPreset::Gaming),
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: AudioSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
        assert!(json.contains("\"gaming\""), "presets serialize kebab-case: {json}");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AudioSettings = serde_json::from_str("{\"muted\":true}").unwrap();
        assert!(settings.muted);
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.eq_preset, None);
    }

    #[test]
    fn engine_config_defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.output_channels, 2);
        assert_eq!(config.max_voices, DEFAULT_MAX_VOICES);
        assert!(!config.start_suspended);
    }
}
