//! Cross-validation splitters

use crate::error::{AutoMlError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Expanding-window split that respects row order
    TimeSeriesSplit { n_splits: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold {
            n_splits: 5,
            shuffle: true,
        }
    }
}

impl CVStrategy {
    /// Resolve a strategy name (`kfold`, `stratified`, `timeseries`)
    pub fn from_name(name: &str, n_splits: usize) -> Result<Self> {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "kfold" => Ok(CVStrategy::KFold {
                n_splits,
                shuffle: true,
            }),
            "stratified" | "stratifiedkfold" => Ok(CVStrategy::StratifiedKFold {
                n_splits,
                shuffle: true,
            }),
            "timeseries" | "timeseriessplit" => Ok(CVStrategy::TimeSeriesSplit { n_splits }),
            _ => Err(AutoMlError::UnsupportedTuningStrategy(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CVStrategy::KFold { .. } => "kfold",
            CVStrategy::StratifiedKFold { .. } => "stratified",
            CVStrategy::TimeSeriesSplit { .. } => "timeseries",
        }
    }

    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. }
            | CVStrategy::StratifiedKFold { n_splits, .. }
            | CVStrategy::TimeSeriesSplit { n_splits } => n_splits,
        }
    }

    pub fn requires_classes(&self) -> bool {
        matches!(self, CVStrategy::StratifiedKFold { .. })
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits; stratification needs class-index targets
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(AutoMlError::invalid_param("n_splits", n_splits, "must be at least 2"));
        }

        match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold_split(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| {
                    AutoMlError::UnsupportedTuningStrategy(
                        "stratified folds require a classification target".to_string(),
                    )
                })?;
                self.stratified_k_fold_split(y, n_splits, shuffle)
            }
            CVStrategy::TimeSeriesSplit { .. } => time_series_split(n_samples, n_splits),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        if n_samples < n_splits {
            return Err(AutoMlError::invalid_param(
                "n_splits",
                n_splits,
                format!("cannot exceed the number of samples ({})", n_samples),
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let mut test_indices = indices[current..current + fold_size].to_vec();
            let mut train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            test_indices.sort_unstable();
            train_indices.sort_unstable();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    /// Deal each class's (shuffled) rows round-robin across folds, continuing
    /// where the previous class stopped so fold sizes stay balanced
    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        if y.len() < n_splits {
            return Err(AutoMlError::invalid_param(
                "n_splits",
                n_splits,
                format!("cannot exceed the number of samples ({})", y.len()),
            ));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values_mut() {
            if shuffle {
                indices.shuffle(&mut rng);
            }
            for &idx in indices.iter() {
                folds[next].push(idx);
                next = (next + 1) % n_splits;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                test_indices.sort_unstable();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();
        Ok(splits)
    }
}

/// Expanding window: fold `i` tests on the `i+1`-th block of `n / (n_splits + 1)` rows
fn time_series_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
    let n_folds = n_splits + 1;
    if n_samples < n_folds {
        return Err(AutoMlError::invalid_param(
            "n_splits",
            n_splits,
            format!("needs at least {} samples, got {}", n_folds, n_samples),
        ));
    }

    let test_size = n_samples / n_folds;
    let first_test = n_samples - n_splits * test_size;

    Ok((0..n_splits)
        .map(|fold_idx| {
            let start = first_test + fold_idx * test_size;
            CVSplit {
                train_indices: (0..start).collect(),
                test_indices: (start..start + test_size).collect(),
                fold_idx,
            }
        })
        .collect())
}
