// src/config/mod.rs
pub mod scenario;
pub mod sampling;
pub mod settings;

// Re-export commonly used types
pub use scenario::{Scenario, RandomVariable};
pub use sampling::{SamplingConfig, SamplingStrategy};
pub use settings::EngineSettings;
