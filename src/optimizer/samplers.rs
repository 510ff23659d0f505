//! Sampling strategies for hyperparameter optimization

use super::search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    TPE,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send {
    /// Sample the next set of hyperparameters given `(params, loss)` history
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler.
///
/// After the start-up trials the history is split at the `gamma` quantile
/// of the loss into good and bad trials. Each parameter is modelled
/// independently by a Parzen density over the good trials `l(x)` and over
/// the bad trials `g(x)`; candidates are drawn from `l` and the one with
/// the largest `l(x) / g(x)` wins.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(0.01, 0.99);
        self
    }

    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn standard_normal(&mut self) -> f64 {
        // Box-Muller
        let u1: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn sample_numeric(&mut self, param: &Parameter, good: &[&TrialParams], bad: &[&TrialParams]) -> ParameterValue {
        let units = |trials: &[&TrialParams]| -> Vec<f64> {
            trials
                .iter()
                .filter_map(|t| t.get(&param.name).and_then(|v| param.to_unit(v)))
                .collect()
        };
        let good_units = units(good);
        let bad_units = units(bad);
        if good_units.is_empty() {
            return param.sample(&mut self.rng);
        }

        let good_bw = bandwidth(&good_units);
        let bad_bw = bandwidth(&bad_units);

        let mut best = (f64::NEG_INFINITY, 0.5);
        for _ in 0..self.n_candidates {
            // the uniform prior is one extra mixture component
            let pick = self.rng.gen_range(0..=good_units.len());
            let candidate = if pick == good_units.len() {
                self.rng.gen::<f64>()
            } else {
                (good_units[pick] + good_bw * self.standard_normal()).clamp(0.0, 1.0)
            };
            let score = parzen_density(candidate, &good_units, good_bw).ln()
                - parzen_density(candidate, &bad_units, bad_bw).ln();
            if score > best.0 {
                best = (score, candidate);
            }
        }
        param.from_unit(best.1)
    }

    fn sample_categorical(
        &mut self,
        param: &Parameter,
        choices: &[String],
        good: &[&TrialParams],
        bad: &[&TrialParams],
    ) -> ParameterValue {
        let weights = |trials: &[&TrialParams]| -> Vec<f64> {
            let mut counts = vec![1.0; choices.len()];
            for t in trials {
                if let Some(idx) = t
                    .get(&param.name)
                    .and_then(ParameterValue::as_str)
                    .and_then(|s| choices.iter().position(|c| c == s))
                {
                    counts[idx] += 1.0;
                }
            }
            let total: f64 = counts.iter().sum();
            counts.into_iter().map(|c| c / total).collect()
        };
        let l = weights(good);
        let g = weights(bad);

        let mut best = (f64::NEG_INFINITY, 0usize);
        for _ in 0..self.n_candidates {
            let mut u: f64 = self.rng.gen();
            let mut idx = l.len().saturating_sub(1);
            for (i, p) in l.iter().enumerate() {
                if u < *p {
                    idx = i;
                    break;
                }
                u -= p;
            }
            let score = l[idx].ln() - g[idx].ln();
            if score > best.0 {
                best = (score, idx);
            }
        }
        ParameterValue::String(choices.get(best.1).cloned().unwrap_or_default())
    }
}

/// Scott-style bandwidth in unit space, floored so densities stay smooth
fn bandwidth(points: &[f64]) -> f64 {
    let n = points.len().max(1) as f64;
    let mean = points.iter().sum::<f64>() / n;
    let sd = (points.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n).sqrt();
    (1.06 * sd * n.powf(-0.2)).clamp(0.05, 0.5)
}

/// Gaussian mixture over `points` plus a uniform prior component on [0, 1]
fn parzen_density(x: f64, points: &[f64], bw: f64) -> f64 {
    let norm = 1.0 / (bw * (2.0 * std::f64::consts::PI).sqrt());
    let kernels: f64 = points
        .iter()
        .map(|p| norm * (-0.5 * ((x - p) / bw).powi(2)).exp())
        .sum();
    (kernels + 1.0) / (points.len() as f64 + 1.0)
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        if history.len() < self.n_startup_trials.max(2) {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted: Vec<&(TrialParams, f64)> = history.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let good: Vec<&TrialParams> = sorted[..n_good].iter().map(|(p, _)| p).collect();
        let bad: Vec<&TrialParams> = sorted[n_good..].iter().map(|(p, _)| p).collect();

        search_space
            .parameters()
            .iter()
            .map(|param| {
                let value = match &param.param_type {
                    ParameterType::Categorical { choices } => {
                        self.sample_categorical(param, choices, &good, &bad)
                    }
                    _ => self.sample_numeric(param, &good, &bad),
                };
                (param.name.clone(), value)
            })
            .collect()
    }
}

/// Create a sampler from type
pub fn create_sampler(sampler_type: SamplerType, seed: u64, n_startup_trials: usize) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::TPE => Box::new(TPESampler::new(seed).with_n_startup(n_startup_trials)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_around(best: f64, n: usize) -> Vec<(TrialParams, f64)> {
        (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                let mut params = TrialParams::new();
                params.insert("x".to_string(), ParameterValue::Float(x));
                (params, (x - best).powi(2))
            })
            .collect()
    }

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1).int("n", 10, 100);
        let params = RandomSampler::new(42).sample(&space, &[]);
        assert!(params.contains_key("lr"));
        assert!(params.contains_key("n"));
    }

    #[test]
    fn test_tpe_concentrates_near_good_region() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let history = history_around(0.8, 40);
        let mut sampler = TPESampler::new(7);

        let draws: Vec<f64> = (0..50)
            .map(|_| sampler.sample(&space, &history)["x"].as_float().unwrap())
            .collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 0.8).abs() < 0.2, "mean draw {mean}");
    }

    #[test]
    fn test_tpe_categorical_prefers_winner() {
        let space = SearchSpace::new().categorical("kernel", &["linear", "rbf", "poly"]);
        let history: Vec<(TrialParams, f64)> = (0..30)
            .map(|i| {
                let kernel = ["linear", "rbf", "poly"][i % 3];
                let mut params = TrialParams::new();
                params.insert("kernel".to_string(), ParameterValue::String(kernel.to_string()));
                (params, if kernel == "rbf" { 0.1 } else { 1.0 })
            })
            .collect();

        let mut sampler = TPESampler::new(3);
        let rbf = (0..20)
            .filter(|_| sampler.sample(&space, &history)["kernel"].as_str() == Some("rbf"))
            .count();
        assert!(rbf >= 15);
    }

    #[test]
    fn test_tpe_startup_is_random() {
        let space = SearchSpace::new().int("n", 1, 5);
        let mut sampler = TPESampler::new(1).with_n_startup(10);
        let params = sampler.sample(&space, &history_around(0.5, 3));
        assert!((1..=5).contains(&params["n"].as_int().unwrap()));
    }
}
