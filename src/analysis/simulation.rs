// src/analysis/simulation.rs

use serde::{Serialize, Deserialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use chrono::{DateTime, Utc};
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::distribution::DistributionParams;
use crate::analysis::formula::{CompiledFormula, Formula};
use crate::analysis::sampling::{self, UniformMatrix};
use crate::analysis::statistics::{self, OutcomeStatistics, VariableSensitivity, HistogramBin};
use crate::config::{EngineSettings, SamplingConfig, SamplingStrategy, Scenario};
use crate::error::{EvalError, SimulationError, ValidationError};

/// Golden-ratio increment used to derive independent chunk streams from the run seed.
const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// A scenario that passed validation, with its distributions and formula
/// compiled for the trial loop.
#[derive(Debug, Clone)]
pub struct ValidatedScenario {
    scenario_id: String,
    name: String,
    unit: String,
    fingerprint: u64,
    variable_ids: Vec<String>,
    params: Vec<DistributionParams>,
    formula: CompiledFormula,
}

impl ValidatedScenario {
    pub fn new(scenario: &Scenario) -> Result<Self, ValidationError> {
        if scenario.variables.is_empty() {
            return Err(ValidationError::NoVariables);
        }

        let mut seen = HashSet::new();
        let mut params = Vec::with_capacity(scenario.variables.len());
        for (index, variable) in scenario.variables.iter().enumerate() {
            if variable.id.trim().is_empty() {
                return Err(ValidationError::EmptyVariableId { index });
            }
            if !seen.insert(variable.id.as_str()) {
                return Err(ValidationError::DuplicateVariable(variable.id.clone()));
            }
            params.push(DistributionParams::from_variable(variable)?);
        }

        if scenario.formula.trim().is_empty() {
            return Err(ValidationError::EmptyFormula);
        }
        let variable_ids: Vec<String> = scenario.variables.iter()
            .map(|v| v.id.clone())
            .collect();
        let slots: Vec<&str> = variable_ids.iter().map(String::as_str).collect();
        let formula = Formula::parse(&scenario.formula)?.bind(&slots)?;

        Ok(Self {
            scenario_id: scenario.id.clone(),
            name: scenario.name.clone(),
            unit: scenario.unit.clone(),
            fingerprint: scenario.fingerprint(),
            variable_ids,
            params,
            formula,
        })
    }

    pub fn variable_ids(&self) -> &[String] {
        &self.variable_ids
    }

    pub fn params(&self) -> &[DistributionParams] {
        &self.params
    }
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    ValidatedScenario::new(scenario).map(|_| ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Validating,
    Running,
    Aggregating,
    Complete,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed | RunState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed_trials: usize,
    pub total_trials: usize,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(ProgressUpdate),
    Finished(Result<SimulationResult, SimulationError>),
}

/// Shared view of a run's completed-trial counter.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    completed: Arc<AtomicUsize>,
    total: usize,
}

impl ProgressHandle {
    fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn fraction(&self) -> f64 {
        self.completed() as f64 / self.total as f64
    }

    fn advance(&self, trials: usize) -> usize {
        self.completed.fetch_add(trials, Ordering::AcqRel) + trials
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Trials that produced no outcome, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidTrials {
    pub division_by_zero: usize,
    pub non_finite: usize,
    pub other: usize,
}

impl InvalidTrials {
    pub fn total(&self) -> usize {
        self.division_by_zero + self.non_finite + self.other
    }

    fn record(&mut self, error: &EvalError) {
        match error {
            EvalError::DivisionByZero => self.division_by_zero += 1,
            EvalError::NonFinite => self.non_finite += 1,
            _ => self.other += 1,
        }
    }

    fn merge(&mut self, other: &InvalidTrials) {
        self.division_by_zero += other.division_by_zero;
        self.non_finite += other.non_finite;
        self.other += other.other;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_id: String,
    pub scenario_name: String,
    pub scenario_fingerprint: u64,
    pub unit: String,
    pub strategy: SamplingStrategy,
    pub seed: u64,
    pub timestamp: DateTime<Utc>,
    pub total_trials: usize,
    pub valid_trials: usize,
    pub invalid_trials: usize,
    pub invalid_breakdown: InvalidTrials,
    pub statistics: OutcomeStatistics,
    pub sensitivity: Vec<VariableSensitivity>,
}

impl SimulationResult {
    pub fn mean(&self) -> f64 {
        self.statistics.mean
    }

    pub fn median(&self) -> f64 {
        self.statistics.median
    }

    pub fn std_dev(&self) -> f64 {
        self.statistics.std_dev
    }

    pub fn var_95(&self) -> f64 {
        self.statistics.var_95
    }

    pub fn var_99(&self) -> f64 {
        self.statistics.var_99
    }

    /// Finite outcomes in ascending order.
    pub fn outcomes(&self) -> &[f64] {
        &self.statistics.sorted_outcomes
    }

    pub fn histogram(&self) -> &[HistogramBin] {
        &self.statistics.histogram
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.statistics.percentile(p)
    }

    pub fn probability_below(&self, threshold: f64) -> f64 {
        self.statistics.probability_below(threshold)
    }

    /// Whether this result was computed from the scenario as it stands now.
    pub fn is_current_for(&self, scenario: &Scenario) -> bool {
        self.scenario_id == scenario.id && self.scenario_fingerprint == scenario.fingerprint()
    }
}

/// Output of one fixed-size chunk of trials.
struct ChunkOutput {
    outcomes: Vec<f64>,
    draws: Vec<f64>,
    invalid: InvalidTrials,
    first_error: Option<EvalError>,
}

/// A run in progress. Each call to `next` executes one batch of trials and
/// yields its progress; the last event carries the result or the error.
pub struct SimulationRun {
    scenario: ValidatedScenario,
    strategy: SamplingStrategy,
    seed: u64,
    total_trials: usize,
    histogram_bins: usize,
    chunk_size: usize,
    chunks_per_batch: usize,
    parallel: bool,
    track_sensitivity: bool,
    matrix: Option<UniformMatrix>,
    outcomes: Vec<f64>,
    draws: Vec<Vec<f64>>,
    invalid: InvalidTrials,
    first_error: Option<EvalError>,
    next_chunk: usize,
    state: RunState,
    progress: ProgressHandle,
    cancel: CancelToken,
}

pub fn run_simulation(scenario: &Scenario, config: &SamplingConfig) -> Result<SimulationRun, SimulationError> {
    run_simulation_with(scenario, config, &EngineSettings::default())
}

pub fn run_simulation_with(
    scenario: &Scenario,
    config: &SamplingConfig,
    settings: &EngineSettings,
) -> Result<SimulationRun, SimulationError> {
    SimulationRun::start(scenario, config, settings)
}

impl SimulationRun {
    fn start(scenario: &Scenario, config: &SamplingConfig, settings: &EngineSettings) -> Result<Self, SimulationError> {
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Validating);

        let validated = settings.validate()
            .and_then(|_| config.validate(settings))
            .map_err(SimulationError::from)
            .and_then(|_| ValidatedScenario::new(scenario).map_err(SimulationError::from));
        let validated = match validated {
            Ok(v) => v,
            Err(e) => {
                transition(&mut state, RunState::Failed);
                warn!(scenario = %scenario.name, error = %e, "Simulation rejected");
                return Err(e);
            }
        };

        let seed = config.seed.unwrap_or_else(rand::random);
        let total_trials = config.trials;
        let variables = validated.params.len();

        let matrix = match config.strategy {
            SamplingStrategy::LatinHypercube => {
                let mut rng = StdRng::seed_from_u64(seed);
                Some(sampling::generate(config.strategy, variables, total_trials, &mut rng)?)
            },
            SamplingStrategy::MonteCarlo => None,
        };

        let total_chunks = total_trials.div_ceil(settings.chunk_size);
        let chunks_per_batch = total_chunks.div_ceil(settings.progress_checkpoints).max(1);

        let draws = if settings.track_sensitivity {
            vec![vec![f64::NAN; total_trials]; variables]
        } else {
            Vec::new()
        };

        info!(
            scenario = %validated.name,
            strategy = %config.strategy,
            trials = total_trials,
            seed,
            "Starting simulation"
        );
        transition(&mut state, RunState::Running);

        Ok(Self {
            scenario: validated,
            strategy: config.strategy,
            seed,
            total_trials,
            histogram_bins: settings.histogram_bins,
            chunk_size: settings.chunk_size,
            chunks_per_batch,
            parallel: settings.parallel,
            track_sensitivity: settings.track_sensitivity,
            matrix,
            outcomes: vec![f64::NAN; total_trials],
            draws,
            invalid: InvalidTrials::default(),
            first_error: None,
            next_chunk: 0,
            state,
            progress: ProgressHandle::new(total_trials),
            cancel: CancelToken::new(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive the run to its end, reporting each checkpoint to `on_progress`.
    pub fn run_to_completion<F>(mut self, mut on_progress: F) -> Result<SimulationResult, SimulationError>
    where
        F: FnMut(ProgressUpdate),
    {
        for event in self.by_ref() {
            match event {
                RunEvent::Progress(update) => on_progress(update),
                RunEvent::Finished(result) => return result,
            }
        }
        Err(SimulationError::Cancelled {
            completed: self.progress.completed(),
            total: self.total_trials,
        })
    }

    fn total_chunks(&self) -> usize {
        self.total_trials.div_ceil(self.chunk_size)
    }

    fn run_batch(&mut self) -> ProgressUpdate {
        let first = self.next_chunk;
        let last = (first + self.chunks_per_batch).min(self.total_chunks());

        let this = &*self;
        let outputs: Vec<ChunkOutput> = if this.parallel {
            (first..last).into_par_iter().map(|c| this.run_chunk(c)).collect()
        } else {
            (first..last).map(|c| this.run_chunk(c)).collect()
        };

        let variables = self.scenario.params.len();
        for (chunk, output) in (first..last).zip(outputs) {
            let start = chunk * self.chunk_size;
            self.outcomes[start..start + output.outcomes.len()].copy_from_slice(&output.outcomes);
            if self.track_sensitivity {
                for (i, row) in output.draws.chunks(variables).enumerate() {
                    for (column, value) in self.draws.iter_mut().zip(row) {
                        column[start + i] = *value;
                    }
                }
            }
            self.invalid.merge(&output.invalid);
            if self.first_error.is_none() {
                self.first_error = output.first_error;
            }
        }

        self.next_chunk = last;
        let trials_done = (last * self.chunk_size).min(self.total_trials);
        let previous = self.progress.completed();
        let completed = self.progress.advance(trials_done - previous);

        debug!(completed, total = self.total_trials, "Batch finished");
        ProgressUpdate {
            completed_trials: completed,
            total_trials: self.total_trials,
            fraction: completed as f64 / self.total_trials as f64,
        }
    }

    fn run_chunk(&self, chunk: usize) -> ChunkOutput {
        let start = chunk * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_trials);
        let params = &self.scenario.params;

        let mut rng = StdRng::seed_from_u64(self.seed ^ (chunk as u64 + 1).wrapping_mul(STREAM_MIX));
        let mut values = vec![0.0; params.len()];
        let mut output = ChunkOutput {
            outcomes: Vec::with_capacity(end - start),
            draws: Vec::with_capacity(if self.track_sensitivity { (end - start) * params.len() } else { 0 }),
            invalid: InvalidTrials::default(),
            first_error: None,
        };

        for trial in start..end {
            match &self.matrix {
                Some(matrix) => {
                    for (value, (p, &u)) in values.iter_mut().zip(params.iter().zip(matrix.row(trial))) {
                        *value = p.sample_from_uniform(u);
                    }
                },
                None => {
                    for (value, p) in values.iter_mut().zip(params) {
                        *value = p.sample_direct(&mut rng);
                    }
                },
            }

            let outcome = match self.scenario.formula.evaluate(&values) {
                Ok(x) => x,
                Err(e) => {
                    output.invalid.record(&e);
                    if output.first_error.is_none() {
                        output.first_error = Some(e);
                    }
                    f64::NAN
                },
            };
            output.outcomes.push(outcome);
            if self.track_sensitivity {
                output.draws.extend_from_slice(&values);
            }
        }

        output
    }

    fn finish(&mut self) -> Result<SimulationResult, SimulationError> {
        transition(&mut self.state, RunState::Aggregating);

        let invalid_trials = self.invalid.total();
        if invalid_trials == self.total_trials {
            let first = self.first_error.clone().unwrap_or(EvalError::NonFinite);
            warn!(total = self.total_trials, error = %first, "Every trial failed");
            return Err(SimulationError::AllTrialsFailed {
                total: self.total_trials,
                first,
            });
        }
        if invalid_trials > 0 {
            warn!(
                invalid = invalid_trials,
                division_by_zero = self.invalid.division_by_zero,
                non_finite = self.invalid.non_finite,
                "Some trials produced no outcome"
            );
        }

        let statistics = statistics::aggregate_with_bins(&self.outcomes, self.histogram_bins)?;
        let sensitivity = if self.track_sensitivity {
            statistics::sensitivities(&self.scenario.variable_ids, &self.draws, &self.outcomes)
        } else {
            Vec::new()
        };

        Ok(SimulationResult {
            scenario_id: self.scenario.scenario_id.clone(),
            scenario_name: self.scenario.name.clone(),
            scenario_fingerprint: self.scenario.fingerprint,
            unit: self.scenario.unit.clone(),
            strategy: self.strategy,
            seed: self.seed,
            timestamp: Utc::now(),
            total_trials: self.total_trials,
            valid_trials: statistics.count,
            invalid_trials,
            invalid_breakdown: self.invalid,
            statistics,
            sensitivity,
        })
    }
}

impl Iterator for SimulationRun {
    type Item = RunEvent;

    fn next(&mut self) -> Option<RunEvent> {
        if self.state.is_terminal() {
            return None;
        }

        if self.cancel.is_cancelled() {
            transition(&mut self.state, RunState::Cancelled);
            let completed = self.progress.completed();
            info!(completed, total = self.total_trials, "Simulation cancelled");
            return Some(RunEvent::Finished(Err(SimulationError::Cancelled {
                completed,
                total: self.total_trials,
            })));
        }

        if self.next_chunk < self.total_chunks() {
            return Some(RunEvent::Progress(self.run_batch()));
        }

        let result = self.finish();
        match &result {
            Ok(r) => {
                transition(&mut self.state, RunState::Complete);
                info!(
                    valid = r.valid_trials,
                    mean = r.mean(),
                    std_dev = r.std_dev(),
                    "Simulation complete"
                );
            },
            Err(_) => transition(&mut self.state, RunState::Failed),
        }
        // Release the buffers; the result owns its own copy of the outcomes.
        self.outcomes = Vec::new();
        self.draws = Vec::new();
        Some(RunEvent::Finished(result))
    }
}

fn transition(state: &mut RunState, next: RunState) {
    let from = *state;
    debug!(?from, to = ?next, "Run state change");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomVariable;

    fn small_settings() -> EngineSettings {
        EngineSettings {
            chunk_size: 100,
            progress_checkpoints: 10,
            ..EngineSettings::default()
        }
    }

    fn sum_scenario() -> Scenario {
        Scenario::new("sum", "a + b")
            .with_variable(RandomVariable::uniform("a", 0.0, 10.0))
            .with_variable(RandomVariable::normal("b", 5.0, 1.0))
    }

    #[test]
    fn test_validation_failures() {
        let empty = Scenario::new("empty", "1");
        assert_eq!(validate_scenario(&empty), Err(ValidationError::NoVariables));

        let duplicate = Scenario::new("dup", "a")
            .with_variable(RandomVariable::normal("a", 0.0, 1.0))
            .with_variable(RandomVariable::uniform("a", 0.0, 1.0));
        assert_eq!(validate_scenario(&duplicate), Err(ValidationError::DuplicateVariable("a".into())));

        let blank = Scenario::new("blank", "1").with_variable(RandomVariable::normal(" ", 0.0, 1.0));
        assert_eq!(validate_scenario(&blank), Err(ValidationError::EmptyVariableId { index: 0 }));

        let no_formula = Scenario::new("none", "  ").with_variable(RandomVariable::normal("a", 0.0, 1.0));
        assert_eq!(validate_scenario(&no_formula), Err(ValidationError::EmptyFormula));

        let unbound = Scenario::new("unbound", "a * c").with_variable(RandomVariable::normal("a", 0.0, 1.0));
        assert_eq!(validate_scenario(&unbound), Err(ValidationError::UnboundIdentifier("c".into())));

        let syntax = Scenario::new("syntax", "a +").with_variable(RandomVariable::normal("a", 0.0, 1.0));
        assert!(matches!(validate_scenario(&syntax), Err(ValidationError::Formula(_))));

        assert_eq!(validate_scenario(&sum_scenario()), Ok(()));
    }

    #[test]
    fn test_config_errors_surface_synchronously() {
        let result = run_simulation(&sum_scenario(), &SamplingConfig::monte_carlo(0));
        assert!(matches!(result, Err(SimulationError::Config(_))));

        let result = run_simulation(&sum_scenario(), &SamplingConfig::latin_hypercube(1));
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }

    #[test]
    fn test_progress_checkpoints_are_bounded_and_monotonic() {
        let run = run_simulation_with(&sum_scenario(), &SamplingConfig::monte_carlo(5_050).with_seed(1), &small_settings()).unwrap();
        let handle = run.progress_handle();

        let mut updates = Vec::new();
        let result = run.run_to_completion(|u| updates.push(u)).unwrap();

        assert!(updates.len() <= 10);
        assert!(updates.windows(2).all(|w| w[0].completed_trials < w[1].completed_trials));
        let last = updates.last().unwrap();
        assert_eq!(last.completed_trials, 5_050);
        assert_eq!(last.fraction, 1.0);
        assert_eq!(handle.completed(), 5_050);
        assert_eq!(result.total_trials, 5_050);
        assert_eq!(result.valid_trials, 5_050);
    }

    #[test]
    fn test_state_transitions() {
        let mut run = run_simulation_with(&sum_scenario(), &SamplingConfig::monte_carlo(500).with_seed(3), &small_settings()).unwrap();
        assert_eq!(run.state(), RunState::Running);

        let mut finished = None;
        while let Some(event) = run.next() {
            if let RunEvent::Finished(result) = event {
                finished = Some(result);
            }
        }
        assert!(finished.unwrap().is_ok());
        assert_eq!(run.state(), RunState::Complete);
        assert!(run.next().is_none());
    }

    #[test]
    fn test_cancellation_discards_partial_result() {
        let mut run = run_simulation_with(&sum_scenario(), &SamplingConfig::monte_carlo(10_000).with_seed(9), &small_settings()).unwrap();
        let token = run.cancel_token();

        assert!(matches!(run.next(), Some(RunEvent::Progress(_))));
        token.cancel();

        match run.next() {
            Some(RunEvent::Finished(Err(SimulationError::Cancelled { completed, total }))) => {
                assert_eq!(completed, 1_000);
                assert_eq!(total, 10_000);
            },
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(run.state(), RunState::Cancelled);
        assert!(run.next().is_none());
    }

    #[test]
    fn test_partial_failures_are_counted() {
        // |x| * 1e309 overflows once |x| exceeds ~0.18
        let scenario = Scenario::new("overflow", "x * 1e308 * 10")
            .with_variable(RandomVariable::uniform("x", -1.0, 1.0));
        let result = run_simulation_with(&scenario, &SamplingConfig::monte_carlo(4_000).with_seed(5), &small_settings())
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();

        assert!(result.valid_trials > 0);
        assert!(result.invalid_trials > 0);
        assert_eq!(result.valid_trials + result.invalid_trials, 4_000);
        assert_eq!(result.invalid_breakdown.non_finite, result.invalid_trials);
        assert_eq!(result.outcomes().len(), result.valid_trials);
    }

    #[test]
    fn test_all_trials_failing_is_fatal() {
        let scenario = Scenario::new("div", "x / (x - x)")
            .with_variable(RandomVariable::normal("x", 1.0, 0.1));
        let result = run_simulation(&scenario, &SamplingConfig::monte_carlo(200).with_seed(2))
            .unwrap()
            .run_to_completion(|_| {});

        assert_eq!(
            result,
            Err(SimulationError::AllTrialsFailed { total: 200, first: EvalError::DivisionByZero })
        );
    }

    #[test]
    fn test_overflowing_leaf_draws_are_counted() {
        // exp(709.5 + z) exceeds f64::MAX once z > ~0.28
        let scenario = Scenario::new("huge", "x")
            .with_variable(RandomVariable::lognormal("x", 709.5, 1.0));
        let result = run_simulation_with(&scenario, &SamplingConfig::monte_carlo(2_000).with_seed(17), &small_settings())
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();

        assert!(result.invalid_trials > 0);
        assert!(result.valid_trials > 0);
        assert_eq!(result.valid_trials + result.invalid_trials, 2_000);
        assert_eq!(result.invalid_breakdown.non_finite, result.invalid_trials);
        assert!(result.outcomes().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_non_finite_literal_fails_every_trial() {
        let scenario = Scenario::new("literal", "1e400")
            .with_variable(RandomVariable::uniform("x", 0.0, 1.0));
        let result = run_simulation(&scenario, &SamplingConfig::monte_carlo(100).with_seed(1))
            .unwrap()
            .run_to_completion(|_| {});

        assert_eq!(
            result,
            Err(SimulationError::AllTrialsFailed { total: 100, first: EvalError::NonFinite })
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        for config in [SamplingConfig::monte_carlo(3_333), SamplingConfig::latin_hypercube(3_333)] {
            let config = config.with_seed(77);
            let parallel = run_simulation_with(&sum_scenario(), &config, &small_settings())
                .unwrap()
                .run_to_completion(|_| {})
                .unwrap();
            let sequential_settings = EngineSettings { parallel: false, ..small_settings() };
            let sequential = run_simulation_with(&sum_scenario(), &config, &sequential_settings)
                .unwrap()
                .run_to_completion(|_| {})
                .unwrap();

            assert_eq!(parallel.statistics, sequential.statistics);
            assert_eq!(parallel.sensitivity, sequential.sensitivity);
        }
    }

    #[test]
    fn test_generated_seed_is_recorded() {
        let scenario = sum_scenario();
        let first = run_simulation(&scenario, &SamplingConfig::monte_carlo(300))
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();
        let replay = run_simulation(&scenario, &SamplingConfig::monte_carlo(300).with_seed(first.seed))
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();
        assert_eq!(first.statistics, replay.statistics);
        assert!(first.is_current_for(&scenario));
    }

    #[test]
    fn test_sensitivity_can_be_disabled() {
        let settings = EngineSettings { track_sensitivity: false, ..small_settings() };
        let result = run_simulation_with(&sum_scenario(), &SamplingConfig::monte_carlo(1_000).with_seed(4), &settings)
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();
        assert!(result.sensitivity.is_empty());

        let tracked = run_simulation_with(&sum_scenario(), &SamplingConfig::monte_carlo(1_000).with_seed(4), &small_settings())
            .unwrap()
            .run_to_completion(|_| {})
            .unwrap();
        // Uniform(0, 10) has a larger variance than Normal(5, 1)
        assert_eq!(tracked.sensitivity[0].variable_id, "a");
    }
}
