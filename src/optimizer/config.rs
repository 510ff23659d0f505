//! Optimization configuration

use super::SamplerType;
use serde::{Deserialize, Serialize};

/// Configuration for hyperparameter optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Cross-validation folds per trial
    pub cv_folds: usize,

    /// Wall-clock budget in seconds; no new trial starts once it is spent
    pub timeout_secs: Option<f64>,

    pub sampler: SamplerType,

    /// Number of initial random samples before TPE takes over
    pub n_startup_trials: usize,

    pub random_state: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 100,
            cv_folds: 5,
            timeout_secs: None,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            random_state: 42,
        }
    }
}

impl OptimizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizationConfig::default();
        assert_eq!(config.n_trials, 100);
        assert_eq!(config.cv_folds, 5);
        assert!(matches!(config.sampler, SamplerType::TPE));
    }

    #[test]
    fn test_builder() {
        let config = OptimizationConfig::new()
            .with_n_trials(50)
            .with_cv_folds(3)
            .with_sampler(SamplerType::Random);

        assert_eq!(config.n_trials, 50);
        assert_eq!(config.cv_folds, 3);
        assert!(matches!(config.sampler, SamplerType::Random));
    }
}
