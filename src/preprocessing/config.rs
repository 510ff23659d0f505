//! Preprocessing configuration

use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the preprocessing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_fraction: f64,

    /// Whether to oversample the minority class when it is under-represented
    pub handle_imbalance: bool,

    /// Oversample when the smallest class holds fewer than this share of
    /// the training rows
    pub smote_minority_threshold: f64,

    /// Neighbours used when synthesizing minority samples
    pub smote_k_neighbors: usize,

    /// Fit imputation and scaling statistics on the training rows only.
    /// When false, statistics are computed over every row before splitting.
    pub fit_on_train_only: bool,

    /// Random seed for the split and resampling
    pub random_state: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            handle_imbalance: true,
            smote_minority_threshold: 0.2,
            smote_k_neighbors: 5,
            fit_on_train_only: true,
            random_state: 42,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the test fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Builder method to toggle imbalance handling
    pub fn with_handle_imbalance(mut self, enabled: bool) -> Self {
        self.handle_imbalance = enabled;
        self
    }

    /// Builder method to set the minority share that triggers oversampling
    pub fn with_smote_threshold(mut self, threshold: f64) -> Self {
        self.smote_minority_threshold = threshold;
        self
    }

    /// Builder method to set SMOTE neighbours
    pub fn with_smote_k_neighbors(mut self, k: usize) -> Self {
        self.smote_k_neighbors = k;
        self
    }

    /// Builder method to choose where statistics are fitted
    pub fn with_fit_on_train_only(mut self, enabled: bool) -> Self {
        self.fit_on_train_only = enabled;
        self
    }

    /// Builder method to set random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(AutoMlError::invalid_param(
                "test_fraction",
                self.test_fraction,
                "must be strictly between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.smote_minority_threshold) {
            return Err(AutoMlError::invalid_param(
                "smote_minority_threshold",
                self.smote_minority_threshold,
                "must be between 0 and 1",
            ));
        }
        if self.smote_k_neighbors == 0 {
            return Err(AutoMlError::invalid_param(
                "smote_k_neighbors",
                self.smote_k_neighbors,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.random_state, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(PreprocessingConfig::new().with_test_fraction(1.0).validate().is_err());
        assert!(PreprocessingConfig::new().with_test_fraction(0.0).validate().is_err());
    }
}
