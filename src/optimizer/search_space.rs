//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float { low: f64, high: f64, log_scale: bool },
    /// Integer parameter, both bounds inclusive
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Sample a uniformly random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len().max(1));
                ParameterValue::String(choices.get(idx).cloned().unwrap_or_default())
            }
            _ => self.from_unit(rng.gen::<f64>()),
        }
    }

    /// Position of a numeric value in [0, 1], log-aware
    pub fn to_unit(&self, value: &ParameterValue) -> Option<f64> {
        let v = value.as_float()?;
        let unit = match self.param_type {
            ParameterType::Float { low, high, log_scale: true } => {
                (v.ln() - low.ln()) / (high.ln() - low.ln())
            }
            ParameterType::Float { low, high, .. } => (v - low) / (high - low),
            // integers occupy equal-width bins
            ParameterType::Int { low, high } => {
                (v - low as f64 + 0.5) / ((high - low) as f64 + 1.0)
            }
            ParameterType::Categorical { .. } => return None,
        };
        Some(if unit.is_finite() { unit.clamp(0.0, 1.0) } else { 0.0 })
    }

    /// Inverse of [`to_unit`](Self::to_unit) for numeric parameters
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high, log_scale: true } => {
                ParameterValue::Float((low.ln() + u * (high.ln() - low.ln())).exp().clamp(*low, *high))
            }
            ParameterType::Float { low, high, .. } => ParameterValue::Float(low + u * (high - low)),
            ParameterType::Int { low, high } => {
                let span = (high - low) as f64 + 1.0;
                let offset = ((u * span).floor() as i64).min(high - low);
                ParameterValue::Int(low + offset)
            }
            ParameterType::Categorical { choices } => {
                let idx = ((u * choices.len() as f64).floor() as usize).min(choices.len().saturating_sub(1));
                ParameterValue::String(choices.get(idx).cloned().unwrap_or_default())
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::String(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::Int(v) => Value::from(*v),
            ParameterValue::Float(v) => Value::from(*v),
            ParameterValue::String(v) => Value::from(v.as_str()),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
            ParameterValue::String(v) => f.write_str(v),
        }
    }
}

/// Alias for sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// JSON object form of a sampled configuration
pub fn params_to_json(params: &TrialParams) -> Map<String, Value> {
    params.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.01, 0.3)
            .int("n_estimators", 10, 200)
            .categorical("kernel", &["linear", "rbf", "poly"]);
        assert_eq!(space.len(), 3);
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::new()
            .log_float("C", 0.1, 100.0)
            .int("max_depth", 3, 20)
            .categorical("kernel", &["linear", "rbf"]);

        for _ in 0..200 {
            let params = space.sample(&mut rng);
            let c = params["C"].as_float().unwrap();
            assert!((0.1..=100.0).contains(&c));
            let depth = params["max_depth"].as_int().unwrap();
            assert!((3..=20).contains(&depth));
            assert!(["linear", "rbf"].contains(&params["kernel"].as_str().unwrap()));
        }
    }

    #[test]
    fn test_unit_round_trip_for_ints() {
        let p = Parameter::int("n", 1, 10);
        for v in 1..=10 {
            let u = p.to_unit(&ParameterValue::Int(v)).unwrap();
            assert_eq!(p.from_unit(u), ParameterValue::Int(v));
        }
        assert_eq!(p.from_unit(1.0), ParameterValue::Int(10));
    }

    #[test]
    fn test_json_conversion() {
        let mut params = TrialParams::new();
        params.insert("n_estimators".to_string(), ParameterValue::Int(50));
        params.insert("kernel".to_string(), ParameterValue::String("rbf".to_string()));
        let json = params_to_json(&params);
        assert_eq!(json["n_estimators"], Value::from(50));
        assert_eq!(json["kernel"], Value::from("rbf"));
    }
}
