// src/file/mod.rs
use anyhow::Result;
use ron::ser::PrettyConfig;
use std::path::Path;

pub mod scenario;
pub mod results;

pub use scenario::ScenarioFileHandler;
pub use results::{ResultsFileManager, RunMetadata, RunRecord};

// Core trait for file operations
pub trait FileHandler<T> {
    fn load(&self, path: &Path) -> Result<T>;
    fn save(&self, data: &T, path: &Path) -> Result<()>;
}

pub(crate) fn pretty_config() -> PrettyConfig {
    PrettyConfig::new()
        .new_line("\n".to_string())
        .depth_limit(4)
        .separate_tuple_members(true)
}
