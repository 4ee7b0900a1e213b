// src/file/scenario.rs
use super::{FileHandler, pretty_config};
use crate::config::Scenario;
use std::path::Path;
use std::fs;
use anyhow::{Result, Context};

#[derive(Debug, Default)]
pub struct ScenarioFileHandler;

impl ScenarioFileHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FileHandler<Scenario> for ScenarioFileHandler {
    fn load(&self, path: &Path) -> Result<Scenario> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
    }

    fn save(&self, data: &Scenario, path: &Path) -> Result<()> {
        let content = ron::ser::to_string_pretty(data, pretty_config())?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write scenario file: {}", path.display()))?;
        Ok(())
    }
}
