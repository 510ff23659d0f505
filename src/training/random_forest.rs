//! Random Forest implementation (also backs bagging and extra trees)

use super::decision_tree::{class_count, Criterion, DecisionTree, Splitter};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fixed(k) => *k,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each node
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub splitter: Splitter,
    pub random_state: u64,
    is_classification: bool,
    n_classes: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: 42,
            is_classification: true,
            n_classes: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor forest (all features per split)
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            max_features: MaxFeatures::All,
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier(n_estimators)
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit the forest, one tree per rayon task
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutoMlError::TrainingError(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(AutoMlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        self.n_features = n_features;
        if self.is_classification {
            self.n_classes = class_count(y)?;
        }
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|idx| {
                let seed = base_seed.wrapping_add(idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut tree = if self.is_classification {
                    DecisionTree::new_classifier().with_n_classes(self.n_classes)
                } else {
                    DecisionTree::new_regressor()
                }
                .with_criterion(self.criterion)
                .with_max_depth(self.max_depth)
                .with_min_samples_split(self.min_samples_split)
                .with_min_samples_leaf(self.min_samples_leaf)
                .with_max_features(Some(max_features))
                .with_splitter(self.splitter)
                .with_random_state(seed);

                if self.bootstrap {
                    let sample: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let xs = x.select(Axis(0), &sample);
                    let ys = y.select(Axis(0), &sample);
                    tree.fit(&xs, &ys)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect();
        self.trees = trees?;

        let mut importances = Array1::zeros(n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);

        Ok(self)
    }

    /// Mean of the trees' class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(AutoMlError::TrainingError(
                "predict_proba is only available for classification forests".to_string(),
            ));
        }
        if self.trees.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        let probas: Result<Vec<Array2<f64>>> =
            self.trees.par_iter().map(|t| t.predict_proba(x)).collect();
        let mut sum = Array2::zeros((x.nrows(), self.n_classes));
        for p in probas? {
            sum += &p;
        }
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        if self.is_classification {
            let proba = self.predict_proba(x)?;
            Ok(proba.map_axis(Axis(1), |row| argmax(row.iter().copied()) as f64))
        } else {
            let preds: Result<Vec<Array1<f64>>> =
                self.trees.par_iter().map(|t| t.predict(x)).collect();
            let mut sum = Array1::zeros(x.nrows());
            for p in preds? {
                sum += &p;
            }
            Ok(sum / self.trees.len() as f64)
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

/// Index of the largest value; ties resolve to the lowest index
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.8, 5.3],
            [5.1, 5.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier_on_blobs() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new_classifier(20);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 20);
        assert_eq!(rf.predict(&x).unwrap(), y);

        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_regressor_is_reproducible() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let fit = || {
            let mut rf = RandomForest::new_regressor(10).with_random_state(3);
            rf.fit(&x, &y).unwrap();
            rf.predict(&x).unwrap()
        };
        let a = fit();
        assert_eq!(a, fit());
        assert!((a[7] - 8.0).abs() < 2.5);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(50).resolve(5), 5);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
    }

    #[test]
    fn test_argmax_ties_pick_lowest() {
        assert_eq!(argmax([0.5, 0.5, 0.0].into_iter()), 0);
        assert_eq!(argmax([0.1, 0.7, 0.2].into_iter()), 1);
    }
}
