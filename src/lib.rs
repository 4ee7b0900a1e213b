// src/lib.rs
//! Monte Carlo and Latin Hypercube risk simulation.
//!
//! A [`Scenario`] names a set of random variables and a formula over them.
//! [`run_simulation`] validates it, draws the configured number of trials
//! and reduces the outcomes to a [`SimulationResult`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod file;
pub mod logging;

pub use analysis::{
    validate_scenario,
    run_simulation,
    run_simulation_with,
    SimulationResult,
    SimulationRun,
    RunEvent,
    ProgressUpdate,
};
pub use analysis::formula::evaluate;
pub use config::{Scenario, RandomVariable, SamplingConfig, SamplingStrategy, EngineSettings};
pub use error::{ValidationError, ConfigError, EvalError, SimulationError};
