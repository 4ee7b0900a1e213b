// src/main.rs
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use riskmc::analysis::{DistributionParams, SimulationResult};
use riskmc::config::{EngineSettings, SamplingConfig, SamplingStrategy};
use riskmc::file::{FileHandler, ResultsFileManager, ScenarioFileHandler};
use riskmc::{logging, run_simulation_with, validate_scenario};

#[derive(Debug, Parser)]
#[command(name = "riskmc", about = "Monte Carlo / Latin Hypercube risk simulation", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate a scenario and save the result
    Run(RunArgs),
    /// Check a scenario without sampling
    Validate {
        /// Scenario file (RON)
        scenario: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    #[value(name = "mc", alias = "monte-carlo")]
    MonteCarlo,
    #[value(name = "lhs", alias = "latin-hypercube")]
    LatinHypercube,
}

impl From<StrategyArg> for SamplingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::MonteCarlo => SamplingStrategy::MonteCarlo,
            StrategyArg::LatinHypercube => SamplingStrategy::LatinHypercube,
        }
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Scenario file (RON)
    scenario: PathBuf,

    /// Number of trials. Defaults to the `default_trials` engine setting.
    #[arg(long)]
    trials: Option<usize>,

    #[arg(long, value_enum, default_value_t = StrategyArg::MonteCarlo)]
    strategy: StrategyArg,

    /// Seed for a reproducible run. Drawn from entropy when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory receiving the result, outcomes and run index
    #[arg(long, default_value = "results")]
    out: PathBuf,

    /// Engine settings file, overridden by RISKMC_* variables
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(args: RunArgs) -> Result<()> {
    let settings = EngineSettings::load(args.config.as_deref())
        .context("Failed to load engine settings")?;
    let scenario = ScenarioFileHandler::new().load(&args.scenario)?;

    let mut config = SamplingConfig::new(args.strategy.into(), args.trials.unwrap_or(settings.default_trials));
    config.seed = args.seed;

    let mut last_reported = 0;
    let result = run_simulation_with(&scenario, &config, &settings)?
        .run_to_completion(|update| {
            let percent = (update.fraction * 100.0) as usize;
            if percent >= last_reported + 10 || update.completed_trials == update.total_trials {
                info!(completed = update.completed_trials, total = update.total_trials, "{percent}%");
                last_reported = percent;
            }
        })?;

    print_summary(&result);

    let record = ResultsFileManager::new(&args.out).save_result(&result)?;
    println!("Saved {} and {} in {}", record.result_path, record.outcomes_path, args.out.display());
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let scenario = ScenarioFileHandler::new().load(path)?;
    validate_scenario(&scenario)
        .with_context(|| format!("Scenario '{}' is invalid", scenario.name))?;

    println!("Scenario '{}' is valid: {} variables, formula `{}`",
        scenario.name, scenario.variables.len(), scenario.formula);
    for variable in &scenario.variables {
        let params = DistributionParams::from_variable(variable)?;
        match (params.theoretical_mean(), params.theoretical_std_dev()) {
            (Some(mean), Some(std_dev)) => println!(
                "  {:<16} {:<10} mean {:>12.4}  std {:>12.4}",
                variable.id, params.dist_type().name(), mean, std_dev
            ),
            _ => println!("  {:<16} {}", variable.id, params.dist_type().name()),
        }
    }
    Ok(())
}

fn print_summary(result: &SimulationResult) {
    let unit = if result.unit.is_empty() { String::new() } else { format!(" {}", result.unit) };
    let stats = &result.statistics;

    println!("{} ({}, {} trials, seed {})", result.scenario_name, result.strategy, result.total_trials, result.seed);
    if result.invalid_trials > 0 {
        println!("  invalid trials: {} (division by zero {}, non-finite {})",
            result.invalid_trials,
            result.invalid_breakdown.division_by_zero,
            result.invalid_breakdown.non_finite);
    }
    println!("  mean     {:>14.4}{unit}", stats.mean);
    println!("  median   {:>14.4}{unit}", stats.median);
    println!("  std dev  {:>14.4}{unit}", stats.std_dev);
    println!("  VaR 95%  {:>14.4}{unit}", stats.var_95);
    println!("  VaR 99%  {:>14.4}{unit}", stats.var_99);
    println!("  min      {:>14.4}{unit}", stats.min);
    println!("  max      {:>14.4}{unit}", stats.max);
    println!("  skewness {:>14.4}", stats.skewness);
    println!("  kurtosis {:>14.4}", stats.kurtosis);
    println!("  P(< 0)   {:>14.4}", result.probability_below(0.0));

    for ci in stats.confidence_intervals.iter().filter(|ci| ci.confidence_level < 1.0) {
        println!("  {:>3.0}% interval [{:.4}, {:.4}]", ci.confidence_level * 100.0, ci.lower_bound, ci.upper_bound);
    }
    if !result.sensitivity.is_empty() {
        println!("  sensitivity:");
        for s in &result.sensitivity {
            println!("    {:<16} r = {:>7.4}  {:>6.2}%", s.variable_id, s.correlation, s.contribution_percent);
        }
    }
}

fn main() -> Result<()> {
    logging::init_tracing();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Validate { scenario } => validate(&scenario),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(args).map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_options() {
        let command = parse(&[
            "riskmc", "run", "s.ron", "--trials", "5000", "--strategy", "lhs", "--seed", "42", "--out", "out",
        ]).unwrap();
        let Command::Run(args) = command else {
            panic!("expected run");
        };
        assert_eq!(args.scenario, PathBuf::from("s.ron"));
        assert_eq!(args.trials, Some(5000));
        assert_eq!(SamplingStrategy::from(args.strategy), SamplingStrategy::LatinHypercube);
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.out, PathBuf::from("out"));
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_run_defaults() {
        let Command::Run(args) = parse(&["riskmc", "run", "s.ron"]).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(args.strategy, StrategyArg::MonteCarlo);
        assert_eq!(args.trials, None);
        assert_eq!(args.out, PathBuf::from("results"));

        let Command::Run(args) = parse(&["riskmc", "run", "s.ron", "--strategy", "latin-hypercube"]).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(args.strategy, StrategyArg::LatinHypercube);
    }

    #[test]
    fn test_parse_validate() {
        let Command::Validate { scenario } = parse(&["riskmc", "validate", "s.ron"]).unwrap() else {
            panic!("expected validate");
        };
        assert_eq!(scenario, PathBuf::from("s.ron"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["riskmc"]).is_err());
        assert!(parse(&["riskmc", "run"]).is_err());
        assert!(parse(&["riskmc", "run", "s.ron", "--trials"]).is_err());
        assert!(parse(&["riskmc", "run", "s.ron", "--trials", "many"]).is_err());
        assert!(parse(&["riskmc", "run", "s.ron", "--strategy", "grid"]).is_err());
        assert!(parse(&["riskmc", "run", "s.ron", "--verbose"]).is_err());
        assert!(parse(&["riskmc", "simulate"]).is_err());
    }
}
