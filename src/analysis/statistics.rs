// src/analysis/statistics.rs

use serde::{Serialize, Deserialize};
use crate::error::SimulationError;

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

const CONFIDENCE_LEVELS: [f64; 3] = [0.90, 0.95, 0.99];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBin {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub count: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceInterval {
    pub confidence_level: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Summary of the finite outcomes of a run.
///
/// `var_95` and `var_99` are low-tail order statistics of the ascending
/// outcomes (5th and 1st percentile), so `var_99 <= var_95` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub min: f64,
    pub max: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub confidence_intervals: Vec<ConfidenceInterval>,
    pub histogram: Vec<HistogramBin>,
    pub sorted_outcomes: Vec<f64>,
}

impl OutcomeStatistics {
    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.sorted_outcomes, p)
    }

    /// Fraction of outcomes strictly below `threshold`.
    pub fn probability_below(&self, threshold: f64) -> f64 {
        if self.sorted_outcomes.is_empty() {
            return 0.0;
        }
        let below = self.sorted_outcomes.partition_point(|&x| x < threshold);
        below as f64 / self.sorted_outcomes.len() as f64
    }
}

/// Per-variable influence on the outcome, measured on the trials that
/// produced a finite outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableSensitivity {
    pub variable_id: String,
    pub correlation: f64,
    pub contribution_percent: f64,
    pub sample_mean: f64,
    pub sample_range: (f64, f64),
}

pub fn aggregate(outcomes: &[f64]) -> Result<OutcomeStatistics, SimulationError> {
    aggregate_with_bins(outcomes, DEFAULT_HISTOGRAM_BINS)
}

/// Reduce `outcomes` to summary statistics. Non-finite entries are skipped.
pub fn aggregate_with_bins(outcomes: &[f64], bins: usize) -> Result<OutcomeStatistics, SimulationError> {
    let mut sorted: Vec<f64> = outcomes.iter()
        .copied()
        .filter(|x| x.is_finite())
        .collect();

    if sorted.is_empty() {
        return Err(SimulationError::NoFiniteOutcomes { total: outcomes.len() });
    }

    sorted.sort_by(f64::total_cmp);
    Ok(summarize_sorted(sorted, bins.max(1)))
}

fn summarize_sorted(sorted: Vec<f64>, bins: usize) -> OutcomeStatistics {
    let n = sorted.len();
    let count = n as f64;

    // Moments are taken on values divided by a power of two so the sums stay
    // finite near f64::MAX. The division is exact for normal numbers.
    let scale = power_of_two_scale(&sorted);
    let scaled_mean = sorted.iter().map(|x| x / scale).sum::<f64>() / count;
    let scaled_variance = sorted.iter()
        .map(|x| (x / scale - scaled_mean).powi(2))
        .sum::<f64>() / count;
    let scaled_std = scaled_variance.sqrt();

    let (skewness, kurtosis) = if scaled_std > 0.0 {
        let (m3, m4) = sorted.iter().fold((0.0, 0.0), |(m3, m4), x| {
            let z = (x / scale - scaled_mean) / scaled_std;
            (m3 + z.powi(3), m4 + z.powi(4))
        });
        (m3 / count, m4 / count - 3.0)
    } else {
        (0.0, 0.0)
    };
    let mean = scaled_mean * scale;
    let std_dev = scaled_std * scale;

    let at = |p: f64| sorted[order_index(n, p)];

    OutcomeStatistics {
        count: n,
        mean,
        median: at(0.5),
        std_dev,
        var_95: at(0.05),
        var_99: at(0.01),
        min: sorted[0],
        max: sorted[n - 1],
        skewness,
        kurtosis,
        confidence_intervals: confidence_intervals(&sorted),
        histogram: histogram(&sorted, bins),
        sorted_outcomes: sorted,
    }
}

/// Largest power of two not above the biggest magnitude in `values`.
fn power_of_two_scale(values: &[f64]) -> f64 {
    let max_abs = values.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if max_abs > 0.0 && max_abs.is_finite() {
        max_abs.log2().floor().exp2()
    } else {
        1.0
    }
}

fn mean(values: &[f64]) -> f64 {
    let scale = power_of_two_scale(values);
    values.iter().map(|x| x / scale).sum::<f64>() / values.len() as f64 * scale
}

/// `floor(p * n)` clamped into the slice.
fn order_index(n: usize, p: f64) -> usize {
    ((p * n as f64).floor() as usize).min(n - 1)
}

pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    Some(sorted[order_index(sorted.len(), p)])
}

fn confidence_intervals(sorted: &[f64]) -> Vec<ConfidenceInterval> {
    let n = sorted.len();

    let mut intervals = vec![ConfidenceInterval {
        confidence_level: 1.0,
        lower_bound: sorted[0],
        upper_bound: sorted[n - 1],
    }];

    intervals.extend(CONFIDENCE_LEVELS.iter().map(|&confidence| {
        let alpha = 1.0 - confidence;
        ConfidenceInterval {
            confidence_level: confidence,
            lower_bound: sorted[order_index(n, alpha / 2.0)],
            upper_bound: sorted[order_index(n, 1.0 - alpha / 2.0)],
        }
    }));

    intervals
}

/// Equal-width bins over [min, max]. Bin membership comes from a single
/// index computation per value, so counts always sum to the input length.
fn histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];

    if max <= min {
        return vec![HistogramBin {
            label: format!("[{:.4}, {:.4}]", min, max),
            start: min,
            end: max,
            count: n,
            probability: 1.0,
        }];
    }

    // Offsets are measured in halves: `max - min` overflows when the bounds
    // sit near opposite ends of the f64 range.
    let half_min = min / 2.0;
    let half_width = (max / 2.0 - half_min) / num_bins as f64;
    let edge = |i: usize| 2.0 * (half_min + i as f64 * half_width);

    let mut counts = vec![0usize; num_bins];
    for &x in sorted {
        // x == max lands in the last bin
        let index = (((x / 2.0 - half_min) / half_width) as usize).min(num_bins - 1);
        counts[index] += 1;
    }

    counts.into_iter()
        .enumerate()
        .map(|(i, count)| {
            let start = if i == 0 { min } else { edge(i) };
            let last = i + 1 == num_bins;
            let end = if last { max } else { edge(i + 1) };
            let close = if last { ']' } else { ')' };
            HistogramBin {
                label: format!("[{:.4}, {:.4}{}", start, end, close),
                start,
                end,
                count,
                probability: count as f64 / n as f64,
            }
        })
        .collect()
}

/// Pearson correlation of two equally long samples, `None` when either side
/// has no variance.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    // Correlation is scale-free, so both sides are normalized first.
    let x_scale = power_of_two_scale(&x[..n]);
    let y_scale = power_of_two_scale(&y[..n]);
    let x_mean = x[..n].iter().map(|v| v / x_scale).sum::<f64>() / n as f64;
    let y_mean = y[..n].iter().map(|v| v / y_scale).sum::<f64>() / n as f64;

    let (mut covariance, mut x_var, mut y_var) = (0.0, 0.0, 0.0);
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi / x_scale - x_mean;
        let dy = yi / y_scale - y_mean;
        covariance += dx * dy;
        x_var += dx * dx;
        y_var += dy * dy;
    }

    if x_var <= 0.0 || y_var <= 0.0 {
        return None;
    }
    let r = covariance / (x_var.sqrt() * y_var.sqrt());
    r.is_finite().then_some(r)
}

/// Rank variables by squared correlation with the outcome, normalized to
/// percentages. `draws[v][t]` is variable `v` in trial `t`.
pub fn sensitivities(ids: &[String], draws: &[Vec<f64>], outcomes: &[f64]) -> Vec<VariableSensitivity> {
    let valid: Vec<usize> = (0..outcomes.len())
        .filter(|&t| outcomes[t].is_finite())
        .collect();
    let y: Vec<f64> = valid.iter().map(|&t| outcomes[t]).collect();

    let mut result: Vec<VariableSensitivity> = ids.iter()
        .zip(draws)
        .map(|(id, column)| {
            let x: Vec<f64> = valid.iter().map(|&t| column[t]).collect();
            let correlation = pearson_correlation(&x, &y).unwrap_or(0.0);
            let min = x.iter().copied().fold(f64::INFINITY, f64::min);
            let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            VariableSensitivity {
                variable_id: id.clone(),
                correlation,
                contribution_percent: 0.0,
                sample_mean: if x.is_empty() { 0.0 } else { mean(&x) },
                sample_range: (min, max),
            }
        })
        .collect();

    let total: f64 = result.iter().map(|s| s.correlation.powi(2)).sum();
    if total > 0.0 {
        for s in &mut result {
            s.contribution_percent = s.correlation.powi(2) / total * 100.0;
        }
    }

    result.sort_by(|a, b| b.contribution_percent.total_cmp(&a.contribution_percent));
    result
}
