// src/analysis/mod.rs
pub mod distribution;
pub mod sampling;
pub mod formula;
pub mod statistics;
pub mod simulation;

// Re-export commonly used types
pub use distribution::{DistributionType, DistributionParams};
pub use sampling::UniformMatrix;
pub use formula::{Formula, CompiledFormula, FormulaError};
pub use statistics::{
    OutcomeStatistics,
    HistogramBin,
    ConfidenceInterval,
    VariableSensitivity,
    aggregate,
    aggregate_with_bins,
};
pub use simulation::{
    ValidatedScenario,
    SimulationRun,
    SimulationResult,
    RunState,
    RunEvent,
    ProgressUpdate,
    ProgressHandle,
    CancelToken,
    InvalidTrials,
    validate_scenario,
    run_simulation,
    run_simulation_with,
};
