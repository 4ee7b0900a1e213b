// src/config/scenario.rs
use serde::{Serialize, Deserialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// One uncertain input of a scenario.
///
/// `family` is the distribution tag as authored (`Normal`, `LogNormal`,
/// `Uniform`, `Triangular`) and `params` holds the named parameters that
/// family requires. Both are checked by `validate_scenario`, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomVariable {
    pub id: String,
    pub family: String,
    pub params: BTreeMap<String, f64>,
}

impl RandomVariable {
    pub fn new(id: impl Into<String>, family: impl Into<String>, params: &[(&str, f64)]) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            params: params.iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        }
    }

    pub fn normal(id: impl Into<String>, mean: f64, std: f64) -> Self {
        Self::new(id, "Normal", &[("mean", mean), ("std", std)])
    }

    pub fn lognormal(id: impl Into<String>, mu: f64, sigma: f64) -> Self {
        Self::new(id, "LogNormal", &[("mu", mu), ("sigma", sigma)])
    }

    pub fn uniform(id: impl Into<String>, min: f64, max: f64) -> Self {
        Self::new(id, "Uniform", &[("min", min), ("max", max)])
    }

    pub fn triangular(id: impl Into<String>, min: f64, mode: f64, max: f64) -> Self {
        Self::new(id, "Triangular", &[("min", min), ("mode", mode), ("max", max)])
    }

    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }
}

fn new_scenario_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "new_scenario_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub variables: Vec<RandomVariable>,
    pub formula: String,
    #[serde(default)]
    pub unit: String,
}

impl Scenario {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            id: new_scenario_id(),
            name: name.into(),
            description: String::new(),
            variables: Vec::new(),
            formula: formula.into(),
            unit: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_variable(mut self, variable: RandomVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn variable(&self, id: &str) -> Option<&RandomVariable> {
        self.variables.iter().find(|v| v.id == id)
    }

    /// Hash of everything that affects a run's outcome. A stored result whose
    /// fingerprint differs from the scenario's current one is stale.
    ///
    /// Only stable within a single build of the program.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.formula.hash(&mut hasher);
        for variable in &self.variables {
            variable.id.hash(&mut hasher);
            variable.family.to_ascii_lowercase().hash(&mut hasher);
            for (key, value) in &variable.params {
                key.hash(&mut hasher);
                value.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}
