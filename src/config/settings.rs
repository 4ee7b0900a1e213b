// src/config/settings.rs
use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::error::ConfigError;

/// Engine tunables. Loaded from an optional settings file plus `RISKMC_*`
/// environment variables, falling back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub default_trials: usize,
    pub max_trials: usize,
    pub histogram_bins: usize,
    pub progress_checkpoints: usize,
    pub chunk_size: usize,
    pub parallel: bool,
    pub track_sensitivity: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_trials: 10000,
            max_trials: 1_000_000,
            histogram_bins: 50,
            progress_checkpoints: 100,
            chunk_size: 1024,
            parallel: true,
            track_sensitivity: true,
        }
    }
}

impl EngineSettings {
    pub const ENV_PREFIX: &'static str = "RISKMC";

    pub fn load(path: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder
            .add_source(::config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_trials", self.max_trials),
            ("histogram_bins", self.histogram_bins),
            ("progress_checkpoints", self.progress_checkpoints),
            ("chunk_size", self.chunk_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidSetting {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.default_trials == 0 || self.default_trials > self.max_trials {
            return Err(ConfigError::InvalidSetting {
                name: "default_trials",
                reason: format!("must be between 1 and max_trials ({})", self.max_trials),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.histogram_bins, 50);
    }

    #[test]
    fn test_zero_bins_rejected() {
        let settings = EngineSettings {
            histogram_bins: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSetting { name: "histogram_bins", .. })
        ));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "histogram_bins = 20\nparallel = false").unwrap();

        let settings = EngineSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.histogram_bins, 20);
        assert!(!settings.parallel);
        assert_eq!(settings.chunk_size, EngineSettings::default().chunk_size);
    }
}
