// src/analysis/distribution.rs

use serde::{Serialize, Deserialize};
use std::f64::consts::TAU;
use rand::Rng;
use rand_distr::{Distribution as _, Open01, Uniform};
use statrs::distribution::{
    LogNormal as StatsLogNormal,
    Normal as StatsNormal,
    Triangular as StatsTriangular,
    Uniform as StatsUniform,
};
use statrs::statistics::Distribution as StatsDistribution;
use crate::config::RandomVariable;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistributionType {
    Normal,
    LogNormal,
    Uniform,
    Triangular,
}

impl DistributionType {
    /// Case-insensitive lookup of an authored family tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(DistributionType::Normal),
            "lognormal" | "log-normal" => Some(DistributionType::LogNormal),
            "uniform" => Some(DistributionType::Uniform),
            "triangular" => Some(DistributionType::Triangular),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DistributionType::Normal => "Normal",
            DistributionType::LogNormal => "LogNormal",
            DistributionType::Uniform => "Uniform",
            DistributionType::Triangular => "Triangular",
        }
    }

    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            DistributionType::Normal => &["mean", "std"],
            DistributionType::LogNormal => &["mu", "sigma"],
            DistributionType::Uniform => &["min", "max"],
            DistributionType::Triangular => &["min", "mode", "max"],
        }
    }
}

/// Validated, family-specific parameters of a random variable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DistributionParams {
    Normal { mean: f64, std: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Uniform { min: f64, max: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
}

impl DistributionParams {
    pub fn from_variable(variable: &RandomVariable) -> Result<Self, ValidationError> {
        let dist_type = DistributionType::from_tag(&variable.family)
            .ok_or_else(|| ValidationError::UnknownDistribution {
                variable: variable.id.clone(),
                family: variable.family.clone(),
            })?;

        let invalid = |reason: String| ValidationError::InvalidParameter {
            variable: variable.id.clone(),
            reason,
        };

        let required = dist_type.required_params();
        if let Some(extra) = variable.params.keys().find(|k| !required.contains(&k.as_str())) {
            return Err(invalid(format!(
                "unexpected parameter '{}' for {} (expected {})",
                extra,
                dist_type.name(),
                required.join(", ")
            )));
        }

        let get = |param: &'static str| -> Result<f64, ValidationError> {
            let value = variable.param(param).ok_or_else(|| ValidationError::MissingParameter {
                variable: variable.id.clone(),
                family: dist_type.name().to_string(),
                param,
            })?;
            if !value.is_finite() {
                return Err(invalid(format!("parameter '{}' must be finite", param)));
            }
            Ok(value)
        };

        match dist_type {
            DistributionType::Normal => {
                let (mean, std) = (get("mean")?, get("std")?);
                if std <= 0.0 {
                    return Err(invalid(format!("std must be > 0, got {}", std)));
                }
                Ok(DistributionParams::Normal { mean, std })
            },
            DistributionType::LogNormal => {
                let (mu, sigma) = (get("mu")?, get("sigma")?);
                if sigma <= 0.0 {
                    return Err(invalid(format!("sigma must be > 0, got {}", sigma)));
                }
                Ok(DistributionParams::LogNormal { mu, sigma })
            },
            DistributionType::Uniform => {
                let (min, max) = (get("min")?, get("max")?);
                if min >= max {
                    return Err(invalid(format!("uniform requires min < max, got [{}, {}]", min, max)));
                }
                check_width(min, max).map_err(&invalid)?;
                Ok(DistributionParams::Uniform { min, max })
            },
            DistributionType::Triangular => {
                let (min, mode, max) = (get("min")?, get("mode")?, get("max")?);
                if min >= max {
                    return Err(invalid(format!("triangular requires min < max, got [{}, {}]", min, max)));
                }
                check_width(min, max).map_err(&invalid)?;
                if mode < min || mode > max {
                    return Err(invalid(format!(
                        "triangular requires min <= mode <= max, got mode {} outside [{}, {}]",
                        mode, min, max
                    )));
                }
                Ok(DistributionParams::Triangular { min, mode, max })
            },
        }
    }

    pub fn dist_type(&self) -> DistributionType {
        match self {
            DistributionParams::Normal { .. } => DistributionType::Normal,
            DistributionParams::LogNormal { .. } => DistributionType::LogNormal,
            DistributionParams::Uniform { .. } => DistributionType::Uniform,
            DistributionParams::Triangular { .. } => DistributionType::Triangular,
        }
    }

    pub fn sample_direct<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_direct(self, rng)
    }

    pub fn sample_from_uniform(&self, u: f64) -> f64 {
        sample_from_uniform(self, u)
    }

    pub fn theoretical_mean(&self) -> Option<f64> {
        match *self {
            DistributionParams::Normal { mean, std } => StatsNormal::new(mean, std).ok()?.mean(),
            DistributionParams::LogNormal { mu, sigma } => StatsLogNormal::new(mu, sigma).ok()?.mean(),
            DistributionParams::Uniform { min, max } => StatsUniform::new(min, max).ok()?.mean(),
            DistributionParams::Triangular { min, mode, max } => StatsTriangular::new(min, max, mode).ok()?.mean(),
        }
    }

    pub fn theoretical_std_dev(&self) -> Option<f64> {
        match *self {
            DistributionParams::Normal { mean, std } => StatsNormal::new(mean, std).ok()?.std_dev(),
            DistributionParams::LogNormal { mu, sigma } => StatsLogNormal::new(mu, sigma).ok()?.std_dev(),
            DistributionParams::Uniform { min, max } => StatsUniform::new(min, max).ok()?.std_dev(),
            DistributionParams::Triangular { min, mode, max } => StatsTriangular::new(min, max, mode).ok()?.std_dev(),
        }
    }
}

/// Samplers scale by `max - min`, which must be representable.
fn check_width(min: f64, max: f64) -> Result<(), String> {
    if (max - min).is_finite() {
        Ok(())
    } else {
        Err(format!("range [{}, {}] is too wide to sample", min, max))
    }
}

/// Draw one value using the family's native generator.
pub fn sample_direct<R: Rng + ?Sized>(params: &DistributionParams, rng: &mut R) -> f64 {
    match *params {
        DistributionParams::Normal { mean, std } => mean + std * standard_normal(rng),
        DistributionParams::LogNormal { mu, sigma } => (mu + sigma * standard_normal(rng)).exp(),
        DistributionParams::Uniform { min, max } => Uniform::new(min, max).sample(rng),
        DistributionParams::Triangular { min, mode, max } => {
            let u: f64 = rng.gen();
            triangular_inverse_cdf(u, min, mode, max)
        },
    }
}

/// Inverse-CDF transform of `u` in [0, 1).
pub fn sample_from_uniform(params: &DistributionParams, u: f64) -> f64 {
    match *params {
        DistributionParams::Normal { mean, std } => normal_inverse_cdf(u, mean, std),
        DistributionParams::LogNormal { mu, sigma } => normal_inverse_cdf(u, mu, sigma).exp(),
        DistributionParams::Uniform { min, max } => min + u * (max - min),
        DistributionParams::Triangular { min, mode, max } => triangular_inverse_cdf(u, min, mode, max),
    }
}

/// Box-Muller transform. Only the cosine branch is used so the generator
/// stays stateless between calls.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.sample(Open01);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

const P_LOW: f64 = 0.02425;
const P_HIGH: f64 = 1.0 - P_LOW;

const A: [f64; 6] = [
    -3.969683028665376e+01,
    2.209460984245205e+02,
    -2.759285104469687e+02,
    1.383577518672690e+02,
    -3.066479806614716e+01,
    2.506628277459239e+00,
];
const B: [f64; 5] = [
    -5.447609879822406e+01,
    1.615858368580409e+02,
    -1.556989798598866e+02,
    6.680131188771972e+01,
    -1.328068155288572e+01,
];
const C: [f64; 6] = [
    -7.784894002430293e-03,
    -3.223964580411365e-01,
    -2.400758277161838e+00,
    -2.549732539343734e+00,
    4.374664141464968e+00,
    2.938163982698783e+00,
];
const D: [f64; 4] = [
    7.784695709041462e-03,
    3.224671290700398e-01,
    2.445134137142996e+00,
    3.754408661907416e+00,
];

fn tail_quantile(q: f64) -> f64 {
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

/// Rational approximation of the standard normal quantile (Acklam),
/// relative error below 1.15e-9 over the open unit interval.
pub fn standard_normal_inverse_cdf(p: f64) -> f64 {
    // Keep p inside (0, 1) so the tails stay finite
    let p = p.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON / 2.0);

    if p < P_LOW {
        tail_quantile((-2.0 * p.ln()).sqrt())
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail_quantile((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

pub fn normal_inverse_cdf(p: f64, mean: f64, std: f64) -> f64 {
    mean + std * standard_normal_inverse_cdf(p)
}

pub fn triangular_inverse_cdf(u: f64, min: f64, mode: f64, max: f64) -> f64 {
    let f_c = (mode - min) / (max - min);

    if u < f_c {
        min + (u * (max - min) * (mode - min)).sqrt()
    } else {
        max - ((1.0 - u) * (max - min) * (max - mode)).sqrt()
    }
}
