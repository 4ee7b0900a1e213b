// src/error.rs
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::analysis::formula::FormulaError;

/// Problems with a scenario definition. Always raised before any trial runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("scenario has no variables")]
    NoVariables,

    #[error("variable id must not be empty (position {index})")]
    EmptyVariableId { index: usize },

    #[error("duplicate variable id '{0}'")]
    DuplicateVariable(String),

    #[error("variable '{variable}': unknown distribution family '{family}'")]
    UnknownDistribution { variable: String, family: String },

    #[error("variable '{variable}': missing parameter '{param}' for {family}")]
    MissingParameter { variable: String, family: String, param: &'static str },

    #[error("variable '{variable}': {reason}")]
    InvalidParameter { variable: String, reason: String },

    #[error("formula is empty")]
    EmptyFormula,

    #[error("formula: {0}")]
    Formula(#[from] FormulaError),

    #[error("formula references unknown identifier '{0}'")]
    UnboundIdentifier(String),
}

/// Problems with the sampling configuration or engine settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("trial count must be positive")]
    NoTrials,

    #[error("latin hypercube sampling needs at least 2 trials, got {0}")]
    TooFewTrialsForLatinHypercube(usize),

    #[error("trial count {requested} exceeds the configured maximum of {max}")]
    TooManyTrials { requested: usize, max: usize },

    #[error("invalid engine setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Failure of a single trial's formula evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("non-finite result")]
    NonFinite,

    #[error("unbound identifier '{0}'")]
    UnboundIdentifier(String),

    #[error("syntax error: {0}")]
    Syntax(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid scenario: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("all {total} trials failed (first failure: {first})")]
    AllTrialsFailed { total: usize, first: EvalError },

    #[error("no finite outcomes to aggregate out of {total}")]
    NoFiniteOutcomes { total: usize },

    #[error("simulation cancelled after {completed} of {total} trials")]
    Cancelled { completed: usize, total: usize },
}
