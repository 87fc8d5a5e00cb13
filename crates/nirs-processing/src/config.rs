//! Configuration management for the trial pipeline

use nirs_core::{ChannelLayout, NirsError, NirsResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Where the three trial markers come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPolicy {
    /// Use the markers recorded in the export's event column
    Recorded,
    /// Ignore recorded markers and place them at fixed trial times:
    /// quiet stance, walk start, and walk end `end_guard_s` seconds
    /// before the end of the trial
    Synthetic {
        stance_start_s: f64,
        walk_start_s: f64,
        end_guard_s: f64,
    },
}

/// Full configuration of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Configuration name/profile
    pub name: String,
    /// Band-pass lower edge (Hz)
    pub band_low_hz: f64,
    /// Band-pass upper edge (Hz)
    pub band_high_hz: f64,
    /// FIR band-pass order
    pub fir_order: usize,
    /// Channel-to-hemisphere assignment and short-channel set
    pub layout: ChannelLayout,
    /// Trial marker source
    pub event_policy: EventPolicy,
    /// Override of the export's sample rate, when the header is untrusted
    pub sample_rate_override: Option<f64>,
}

impl ProcessingConfig {
    /// Standard walking-study processing: hemodynamic band, recorded markers
    pub fn walking_study() -> Self {
        ProcessingConfig {
            name: "Walking study".to_string(),
            band_low_hz: 0.01,
            band_high_hz: 0.1,
            fir_order: 1000,
            layout: ChannelLayout::walking_study(),
            event_policy: EventPolicy::Recorded,
            sample_rate_override: None,
        }
    }

    /// Walking study with synthesized markers, for exports whose event
    /// column is unreliable: stance at 0 s, walk at 20 s, walk end 10 s
    /// before the end of the trial.
    pub fn walking_study_synthetic_events() -> Self {
        ProcessingConfig {
            name: "Walking study (synthetic events)".to_string(),
            event_policy: EventPolicy::Synthetic {
                stance_start_s: 0.0,
                walk_start_s: 20.0,
                end_guard_s: 10.0,
            },
            ..Self::walking_study()
        }
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> NirsResult<()> {
        if self.name.is_empty() {
            return Err(NirsError::Config {
                reason: "configuration name cannot be empty".to_string(),
            });
        }
        if !(self.band_low_hz > 0.0 && self.band_low_hz < self.band_high_hz) {
            return Err(NirsError::Config {
                reason: format!(
                    "invalid pass-band [{}, {}] Hz",
                    self.band_low_hz, self.band_high_hz
                ),
            });
        }
        if self.fir_order < 2 {
            return Err(NirsError::Config {
                reason: format!("FIR order {} is too small", self.fir_order),
            });
        }
        if let Some(rate) = self.sample_rate_override {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(NirsError::Config {
                    reason: format!("invalid sample-rate override: {}", rate),
                });
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> NirsResult<Self> {
        let config: ProcessingConfig =
            serde_json::from_str(json).map_err(|e| NirsError::Config {
                reason: format!("cannot parse configuration: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> NirsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| NirsError::Config {
            reason: format!("cannot serialize configuration: {}", e),
        })
    }

    pub fn load(path: &Path) -> NirsResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> NirsResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::walking_study()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(ProcessingConfig::walking_study().validate().is_ok());
        assert!(ProcessingConfig::walking_study_synthetic_events()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_invalid_band_rejected() {
        let mut config = ProcessingConfig::walking_study();
        config.band_low_hz = 0.2;
        assert!(config.validate().is_err());

        config = ProcessingConfig::walking_study();
        config.fir_order = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = ProcessingConfig::walking_study_synthetic_events();
        let json = config.to_json().unwrap();
        let restored = ProcessingConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(ProcessingConfig::from_json("{\"name\": 12}").is_err());
    }
}
