//! Sequential optimization loop

use super::config::OptimizationConfig;
use super::samplers::{create_sampler, Sampler};
use super::search_space::{SearchSpace, TrialParams};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub params: TrialParams,
    /// Objective value (loss); infinite when the trial failed
    pub value: f64,
    pub duration_secs: f64,
    /// Error message of a failed trial
    pub error: Option<String>,
}

impl TrialResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Study containing all trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.failed()).count()
    }

    pub fn n_completed(&self) -> usize {
        self.trials.len() - self.n_failed()
    }

    /// Add a trial; failed trials never become best
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = !result.failed()
            && self
                .best_value()
                .map_or(true, |best| result.value < best);
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }
}

/// Minimizes a black-box objective over a search space
pub struct Optimizer {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
    study: Study,
}

impl Optimizer {
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Self {
        let sampler = create_sampler(config.sampler, config.random_state, config.n_startup_trials);
        Self {
            config,
            search_space,
            sampler,
            study: Study::default(),
        }
    }

    /// Run the trial budget. An objective error scores the trial as
    /// `f64::INFINITY` and the search carries on.
    pub fn optimize<F>(&mut self, mut objective: F) -> &Study
    where
        F: FnMut(&TrialParams) -> Result<f64>,
    {
        let start = Instant::now();
        let mut history: Vec<(TrialParams, f64)> = Vec::new();

        for trial_id in 0..self.config.n_trials {
            if let Some(limit) = self.config.timeout_secs {
                if start.elapsed().as_secs_f64() > limit {
                    warn!(completed = trial_id, "Tuning time budget exhausted");
                    break;
                }
            }

            let trial_start = Instant::now();
            let params = self.sampler.sample(&self.search_space, &history);

            let (value, error) = match objective(&params) {
                Ok(v) if v.is_finite() => (v, None),
                Ok(v) => (f64::INFINITY, Some(format!("non-finite objective {}", v))),
                Err(e) => (f64::INFINITY, Some(e.to_string())),
            };
            if let Some(msg) = &error {
                warn!(trial = trial_id, error = %msg, "Trial failed, scoring as worst value");
            }

            history.push((params.clone(), value));
            self.study.add_trial(TrialResult {
                trial_id,
                params,
                value,
                duration_secs: trial_start.elapsed().as_secs_f64(),
                error,
            });
            debug!(
                trial = trial_id,
                value,
                best = self.study.best_value().unwrap_or(f64::INFINITY),
                "Trial finished"
            );
        }

        self.study.total_duration_secs = start.elapsed().as_secs_f64();
        &self.study
    }

    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn into_study(self) -> Study {
        self.study
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutoMlError;

    fn quadratic(params: &TrialParams) -> Result<f64> {
        let x = params.get("x").and_then(|p| p.as_float()).unwrap_or(0.0);
        let y = params.get("y").and_then(|p| p.as_float()).unwrap_or(0.0);
        Ok(x * x + y * y)
    }

    #[test]
    fn test_optimization() {
        let space = SearchSpace::new().float("x", -5.0, 5.0).float("y", -5.0, 5.0);
        let mut optimizer = Optimizer::new(OptimizationConfig::new().with_n_trials(40), space);
        let study = optimizer.optimize(quadratic);

        assert_eq!(study.trials.len(), 40);
        assert!(study.best_value().unwrap() < 10.0);
    }

    #[test]
    fn test_failing_trials_are_scored_not_fatal() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let mut optimizer = Optimizer::new(OptimizationConfig::new().with_n_trials(10), space);
        let study = optimizer.optimize(|p: &TrialParams| {
            let x = p["x"].as_float().unwrap_or(0.0);
            if x < 0.5 {
                Err(AutoMlError::TrainingError("boom".to_string()))
            } else {
                Ok(x)
            }
        });

        assert_eq!(study.trials.len(), 10);
        assert!(study.trials.iter().filter(|t| t.failed()).all(|t| t.value.is_infinite()));
        assert_eq!(study.n_completed() + study.n_failed(), 10);
        if let Some(best) = study.best_trial() {
            assert!(!best.failed());
        }
    }

    #[test]
    fn test_timeout_stops_early() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let config = OptimizationConfig::new().with_n_trials(1000).with_timeout(0.0);
        let mut optimizer = Optimizer::new(config, space);
        let study = optimizer.optimize(|_: &TrialParams| {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Ok(1.0)
        });
        assert!(study.trials.len() < 1000);
    }
}
