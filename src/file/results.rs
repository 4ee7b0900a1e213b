// src/file/results.rs

use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;
use csv::Writer;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use super::pretty_config;
use crate::analysis::SimulationResult;
use crate::config::SamplingStrategy;

const METADATA_FILE: &str = "metadata.ron";

/// Index of every run saved into an output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub scenario_id: String,
    pub scenario_name: String,
    pub result_path: String,
    pub outcomes_path: String,
    pub timestamp: DateTime<Utc>,
    pub strategy: SamplingStrategy,
    pub trials: usize,
    pub seed: u64,
}

#[derive(Debug)]
pub struct ResultsFileManager {
    base_path: PathBuf,
}

impl ResultsFileManager {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            base_path: output_dir.to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write the result, its sorted outcomes and an updated metadata index.
    pub fn save_result(&self, result: &SimulationResult) -> Result<RunRecord> {
        fs::create_dir_all(&self.base_path)
            .with_context(|| format!("Failed to create output directory: {}", self.base_path.display()))?;

        let timestamp_str = result.timestamp.format("%Y%m%d_%H%M%S_%3f").to_string();

        let result_path = self.base_path.join(format!("result_{}.ron", timestamp_str));
        let content = ron::ser::to_string_pretty(result, pretty_config())?;
        fs::write(&result_path, content)
            .with_context(|| format!("Failed to write result file: {}", result_path.display()))?;

        let outcomes_path = self.base_path.join(format!("outcomes_{}.csv", timestamp_str));
        self.save_outcomes(&outcomes_path, result)?;

        let record = RunRecord {
            scenario_id: result.scenario_id.clone(),
            scenario_name: result.scenario_name.clone(),
            result_path: self.relative(&result_path)?,
            outcomes_path: self.relative(&outcomes_path)?,
            timestamp: result.timestamp,
            strategy: result.strategy,
            trials: result.total_trials,
            seed: result.seed,
        };

        let mut metadata = match self.load_metadata() {
            Ok(existing) => existing,
            Err(e) => {
                debug!(error = %e, "Starting a new metadata index");
                RunMetadata {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    created: result.timestamp,
                    last_run: None,
                    runs: Vec::new(),
                }
            }
        };
        metadata.last_run = Some(result.timestamp);
        metadata.runs.push(record.clone());
        self.save_metadata(&metadata)?;

        Ok(record)
    }

    fn save_outcomes(&self, path: &Path, result: &SimulationResult) -> Result<()> {
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("Failed to create outcomes file: {}", path.display()))?;

        writer.write_record(["rank", "outcome", "cumulative_probability"])?;
        let n = result.outcomes().len() as f64;
        for (rank, outcome) in result.outcomes().iter().enumerate() {
            writer.write_record(&[
                rank.to_string(),
                outcome.to_string(),
                ((rank + 1) as f64 / n).to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    fn relative(&self, path: &Path) -> Result<String> {
        // Always use forward slashes when storing paths
        Ok(path.strip_prefix(&self.base_path)?
            .to_string_lossy()
            .replace('\\', "/"))
    }

    pub fn load_metadata(&self) -> Result<RunMetadata> {
        let metadata_path = self.base_path.join(METADATA_FILE);

        if !metadata_path.exists() {
            return Err(anyhow!("Metadata file not found: {}", metadata_path.display()));
        }

        let content = fs::read_to_string(&metadata_path)
            .with_context(|| format!("Failed to read metadata file: {}", metadata_path.display()))?;

        ron::from_str(&content)
            .with_context(|| format!("Failed to parse metadata file: {}", metadata_path.display()))
    }

    fn save_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let metadata_path = self.base_path.join(METADATA_FILE);
        let content = ron::ser::to_string_pretty(metadata, pretty_config())?;
        fs::write(&metadata_path, content)
            .with_context(|| format!("Failed to write metadata file: {}", metadata_path.display()))?;
        Ok(())
    }

    pub fn load_result(&self, record: &RunRecord) -> Result<SimulationResult> {
        let path = self.base_path.join(&record.result_path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read result file: {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse result file: {}", path.display()))
    }

    /// Most recent saved result for `scenario_id`, if any can be read.
    pub fn load_latest_result(&self, scenario_id: &str) -> Option<SimulationResult> {
        let metadata = match self.load_metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "No run index available");
                return None;
            }
        };

        let record = metadata.runs.iter()
            .rev()
            .find(|r| r.scenario_id == scenario_id)?;

        match self.load_result(record) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(path = %record.result_path, error = %e, "Failed to load saved result");
                None
            }
        }
    }
}
