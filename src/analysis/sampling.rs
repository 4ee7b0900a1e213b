// src/analysis/sampling.rs

use rand::Rng;
use rand::seq::SliceRandom;
use crate::config::SamplingStrategy;
use crate::error::ConfigError;

/// Largest f64 strictly below 1.0.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// Uniform coordinates in [0, 1), stored row-major as `[trial][variable]`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformMatrix {
    trials: usize,
    variables: usize,
    data: Vec<f64>,
}

impl UniformMatrix {
    fn zeroed(trials: usize, variables: usize) -> Self {
        Self {
            trials,
            variables,
            data: vec![0.0; trials * variables],
        }
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn variables(&self) -> usize {
        self.variables
    }

    pub fn row(&self, trial: usize) -> &[f64] {
        let start = trial * self.variables;
        &self.data[start..start + self.variables]
    }

    /// All trials' coordinates for one variable.
    pub fn column(&self, variable: usize) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().skip(variable).step_by(self.variables.max(1)).copied()
    }
}

pub fn generate<R: Rng + ?Sized>(
    strategy: SamplingStrategy,
    variable_count: usize,
    trial_count: usize,
    rng: &mut R,
) -> Result<UniformMatrix, ConfigError> {
    if trial_count == 0 {
        return Err(ConfigError::NoTrials);
    }

    match strategy {
        SamplingStrategy::MonteCarlo => Ok(independent(variable_count, trial_count, rng)),
        SamplingStrategy::LatinHypercube => {
            if trial_count < 2 {
                return Err(ConfigError::TooFewTrialsForLatinHypercube(trial_count));
            }
            Ok(latin_hypercube(variable_count, trial_count, rng))
        },
    }
}

fn independent<R: Rng + ?Sized>(variable_count: usize, trial_count: usize, rng: &mut R) -> UniformMatrix {
    let mut matrix = UniformMatrix::zeroed(trial_count, variable_count);
    for value in matrix.data.iter_mut() {
        *value = rng.gen();
    }
    matrix
}

/// Each dimension is split into `trial_count` equal strata and every stratum
/// is visited by exactly one trial, in an independently shuffled order.
fn latin_hypercube<R: Rng + ?Sized>(variable_count: usize, trial_count: usize, rng: &mut R) -> UniformMatrix {
    let mut matrix = UniformMatrix::zeroed(trial_count, variable_count);
    let n = trial_count as f64;
    let mut strata: Vec<usize> = (0..trial_count).collect();

    for variable in 0..variable_count {
        strata.shuffle(rng);
        for (trial, &stratum) in strata.iter().enumerate() {
            let jitter: f64 = rng.gen();
            let u = ((stratum as f64 + jitter) / n).min(BELOW_ONE);
            matrix.data[trial * variable_count + variable] = u;
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lhs_one_draw_per_stratum() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 500;
        let matrix = generate(SamplingStrategy::LatinHypercube, 3, n, &mut rng).unwrap();

        for variable in 0..3 {
            let mut seen = vec![0usize; n];
            for u in matrix.column(variable) {
                assert!((0.0..1.0).contains(&u));
                seen[(u * n as f64).floor() as usize] += 1;
            }
            assert!(seen.iter().all(|&count| count == 1), "dimension {} not stratified", variable);
        }
    }

    #[test]
    fn test_lhs_dimensions_are_shuffled_independently() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 200;
        let matrix = generate(SamplingStrategy::LatinHypercube, 2, n, &mut rng).unwrap();

        let strata = |variable: usize| -> Vec<usize> {
            matrix.column(variable).map(|u| (u * n as f64) as usize).collect()
        };
        assert_ne!(strata(0), strata(1));
    }

    #[test]
    fn test_monte_carlo_matrix_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let matrix = generate(SamplingStrategy::MonteCarlo, 4, 10, &mut rng).unwrap();
        assert_eq!(matrix.trials(), 10);
        assert_eq!(matrix.variables(), 4);
        assert_eq!(matrix.row(9).len(), 4);
        assert_eq!(matrix.row(2)[3], matrix.column(3).nth(2).unwrap());
    }

    #[test]
    fn test_trial_count_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            generate(SamplingStrategy::MonteCarlo, 1, 0, &mut rng),
            Err(ConfigError::NoTrials)
        );
        assert_eq!(
            generate(SamplingStrategy::LatinHypercube, 1, 1, &mut rng),
            Err(ConfigError::TooFewTrialsForLatinHypercube(1))
        );
    }

    #[test]
    fn test_lhs_seeded_is_reproducible() {
        let a = generate(SamplingStrategy::LatinHypercube, 2, 64, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate(SamplingStrategy::LatinHypercube, 2, 64, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }
}
