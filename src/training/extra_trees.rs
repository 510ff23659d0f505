//! Extra Trees (Extremely Randomized Trees) implementation
//!
//! Unlike Random Forest which searches for the best split among a random subset
//! of features, Extra Trees draws the threshold at random as well and fits each
//! tree on the full training set.

use super::random_forest::{MaxFeatures, RandomForest};
use super::decision_tree::Splitter;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Extra Trees model (Classifier + Regressor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    forest: RandomForest,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl ExtraTrees {
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::wrap(RandomForest::new_classifier(n_estimators).with_max_features(MaxFeatures::Sqrt))
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::wrap(RandomForest::new_regressor(n_estimators).with_max_features(MaxFeatures::All))
    }

    fn wrap(forest: RandomForest) -> Self {
        Self {
            forest: forest.with_splitter(Splitter::Random).with_bootstrap(false),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.forest = self.forest.with_max_depth(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.forest = self.forest.with_min_samples_split(n);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.forest = self.forest.with_min_samples_leaf(n);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.forest = self.forest.with_max_features(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.forest = self.forest.with_random_state(seed);
        self
    }

    pub fn is_classification(&self) -> bool {
        self.forest.is_classification()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.forest.fit(x, y)?;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.forest.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.forest.predict_proba(x)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.forest.feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extra_trees_classifier() {
        let x = array![[0.0], [0.5], [1.0], [1.5], [8.0], [8.5], [9.0], [9.5]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut et = ExtraTrees::new_classifier(25).with_random_state(11);
        et.fit(&x, &y).unwrap();
        assert_eq!(et.predict(&array![[0.2], [9.2]]).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn test_extra_trees_regressor_tracks_trend() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| 2.0 * i as f64);

        let mut et = ExtraTrees::new_regressor(30);
        et.fit(&x, &y).unwrap();
        let preds = et.predict(&array![[1.0], [18.0]]).unwrap();
        assert!(preds[0] < preds[1]);
        assert!(et.feature_importances().is_some());
    }
}
