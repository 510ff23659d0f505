//! Session configuration

use crate::error::{AutoMlError, Result};
use crate::optimizer::OptimizationConfig;
use crate::preprocessing::PreprocessingConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Settings shared by every operation of a [`Session`](super::Session)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed for splitting, resampling, estimators and search
    pub random_state: u64,
    pub test_fraction: f64,
    pub handle_imbalance: bool,
    /// SMOTE is applied when the smallest training class is below this share
    pub smote_minority_threshold: f64,
    /// Bias analysis flags imbalance above this max/min class ratio
    pub imbalance_ratio_threshold: f64,
    /// Numeric targets with at most this many integral values are classes
    pub classification_max_unique: usize,
    pub smote_k_neighbors: usize,
    pub fit_on_train_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            random_state: 42,
            test_fraction: 0.2,
            handle_imbalance: true,
            smote_minority_threshold: 0.2,
            imbalance_ratio_threshold: 3.0,
            classification_max_unique: 10,
            smote_k_neighbors: 5,
            fit_on_train_only: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_handle_imbalance(mut self, enabled: bool) -> Self {
        self.handle_imbalance = enabled;
        self
    }

    pub fn with_smote_minority_threshold(mut self, threshold: f64) -> Self {
        self.smote_minority_threshold = threshold;
        self
    }

    pub fn with_imbalance_ratio_threshold(mut self, ratio: f64) -> Self {
        self.imbalance_ratio_threshold = ratio;
        self
    }

    pub fn with_classification_max_unique(mut self, n: usize) -> Self {
        self.classification_max_unique = n;
        self
    }

    pub fn with_smote_k_neighbors(mut self, k: usize) -> Self {
        self.smote_k_neighbors = k;
        self
    }

    pub fn with_fit_on_train_only(mut self, enabled: bool) -> Self {
        self.fit_on_train_only = enabled;
        self
    }

    /// Read a config from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocessing_config(self.test_fraction, self.handle_imbalance)
            .validate()?;
        if !(self.imbalance_ratio_threshold >= 1.0) {
            return Err(AutoMlError::invalid_param(
                "imbalance_ratio_threshold",
                self.imbalance_ratio_threshold,
                "must be at least 1",
            ));
        }
        if self.classification_max_unique == 0 {
            return Err(AutoMlError::invalid_param(
                "classification_max_unique",
                self.classification_max_unique,
                "must be positive",
            ));
        }
        Ok(())
    }

    pub(crate) fn preprocessing_config(
        &self,
        test_fraction: f64,
        handle_imbalance: bool,
    ) -> PreprocessingConfig {
        PreprocessingConfig::new()
            .with_test_fraction(test_fraction)
            .with_handle_imbalance(handle_imbalance)
            .with_smote_threshold(self.smote_minority_threshold)
            .with_smote_k_neighbors(self.smote_k_neighbors)
            .with_fit_on_train_only(self.fit_on_train_only)
            .with_random_state(self.random_state)
    }

    pub(crate) fn optimization_config(&self, n_trials: usize, cv_folds: usize) -> OptimizationConfig {
        OptimizationConfig::new()
            .with_n_trials(n_trials)
            .with_cv_folds(cv_folds)
            .with_random_state(self.random_state)
    }
}
