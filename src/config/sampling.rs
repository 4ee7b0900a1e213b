// src/config/sampling.rs
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::config::EngineSettings;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SamplingStrategy {
    #[default]
    MonteCarlo,
    LatinHypercube,
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingStrategy::MonteCarlo => write!(f, "Monte Carlo"),
            SamplingStrategy::LatinHypercube => write!(f, "Latin Hypercube"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingConfig {
    pub strategy: SamplingStrategy,
    pub trials: usize,
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::MonteCarlo,
            trials: 10000,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn new(strategy: SamplingStrategy, trials: usize) -> Self {
        Self {
            strategy,
            trials,
            seed: None,
        }
    }

    pub fn monte_carlo(trials: usize) -> Self {
        Self::new(SamplingStrategy::MonteCarlo, trials)
    }

    pub fn latin_hypercube(trials: usize) -> Self {
        Self::new(SamplingStrategy::LatinHypercube, trials)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self, settings: &EngineSettings) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.strategy == SamplingStrategy::LatinHypercube && self.trials < 2 {
            return Err(ConfigError::TooFewTrialsForLatinHypercube(self.trials));
        }
        if self.trials > settings.max_trials {
            return Err(ConfigError::TooManyTrials {
                requested: self.trials,
                max: settings.max_trials,
            });
        }
        Ok(())
    }
}
