//! AdaBoost (Adaptive Boosting) implementation
//!
//! The classifier follows SAMME with weighted decision stumps. The regressor
//! follows AdaBoost.R2 (linear loss) over shallow regression trees and
//! predicts with the weighted median of its members.

use super::decision_tree::{class_count, DecisionTree};
use super::random_forest::argmax;
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutoMlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(AutoMlError::TrainingError(
            "cannot boost on zero samples".to_string(),
        ));
    }
    Ok(())
}

fn weighted_importances(learners: &[DecisionTree], weights: &[f64], n_features: usize) -> Array1<f64> {
    let mut total = Array1::zeros(n_features);
    for (tree, &w) in learners.iter().zip(weights) {
        if let Some(imp) = tree.feature_importances() {
            total.scaled_add(w, imp);
        }
    }
    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    total
}

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    n_classes: usize,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            random_state: 42,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_learners(&self) -> usize {
        self.stumps.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(AutoMlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        let k = class_count(y)?.max(2);
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.stumps.clear();
        self.alphas.clear();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::new_classifier()
                .with_max_depth(Some(1))
                .with_n_classes(k)
                .with_random_state(self.random_state.wrapping_add(round as u64));
            stump.fit_weighted(x, y, Some(&weights))?;
            let preds = stump.predict(x)?;

            let wrong: Vec<bool> = preds.iter().zip(y.iter()).map(|(p, t)| p != t).collect();
            let total: f64 = weights.sum();
            let err: f64 = weights
                .iter()
                .zip(&wrong)
                .filter(|(_, &w)| w)
                .map(|(wt, _)| wt)
                .sum::<f64>()
                / total;

            if err <= 1e-12 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if err >= 1.0 - 1.0 / k as f64 {
                debug!(round, err, "AdaBoost learner no better than chance, stopping");
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * (((1.0 - err) / err).ln() + ((k - 1) as f64).ln());
            for (w, &is_wrong) in weights.iter_mut().zip(&wrong) {
                if is_wrong {
                    *w *= alpha.exp();
                }
            }
            let sum = weights.sum();
            weights /= sum;

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        self.n_classes = k;
        self.n_features = x.ncols();
        Ok(self)
    }

    /// Normalised weighted votes per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.stumps.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        let mut votes = Array2::zeros((x.nrows(), self.n_classes));
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            let preds = stump.predict(x)?;
            for (i, &p) in preds.iter().enumerate() {
                votes[[i, p as usize]] += alpha;
            }
        }
        for mut row in votes.outer_iter_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }
        Ok(votes)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.map_axis(ndarray::Axis(1), |row| argmax(row.iter().copied()) as f64))
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() {
            return None;
        }
        Some(weighted_importances(&self.stumps, &self.alphas, self.n_features))
    }
}

/// AdaBoost Regressor (AdaBoost.R2, linear loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub random_state: u64,
    learners: Vec<DecisionTree>,
    learner_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth: 3,
            random_state: 42,
            learners: Vec::new(),
            learner_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(AutoMlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        self.learners.clear();
        self.learner_weights.clear();

        for round in 0..self.n_estimators {
            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.max_depth))
                .with_random_state(self.random_state.wrapping_add(round as u64));
            tree.fit_weighted(x, y, Some(&weights))?;
            let preds = tree.predict(x)?;

            let errors = (&preds - y).mapv(f64::abs);
            let max_err = errors.fold(0.0_f64, |a, &b| a.max(b));
            if max_err <= 1e-12 {
                self.learners.push(tree);
                self.learner_weights.push(1.0);
                break;
            }
            let loss = errors / max_err;
            let avg_loss = (&loss * &weights).sum() / weights.sum();

            if avg_loss >= 0.5 {
                debug!(round, avg_loss, "AdaBoost.R2 average loss above 0.5, stopping");
                if self.learners.is_empty() {
                    self.learners.push(tree);
                    self.learner_weights.push(1.0);
                }
                break;
            }
            if avg_loss <= 1e-12 {
                self.learners.push(tree);
                self.learner_weights.push(1.0);
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            let lr = self.learning_rate;
            for (w, &l) in weights.iter_mut().zip(loss.iter()) {
                *w *= beta.powf((1.0 - l) * lr);
            }
            let sum = weights.sum();
            weights /= sum;

            self.learners.push(tree);
            self.learner_weights.push(lr * (1.0 / beta).ln());
        }

        self.n_features = x.ncols();
        Ok(self)
    }

    /// Weighted median of the member predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.learners.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        let member_preds: Vec<Array1<f64>> = self
            .learners
            .iter()
            .map(|t| t.predict(x))
            .collect::<Result<_>>()?;

        let half = self.learner_weights.iter().sum::<f64>() / 2.0;
        let mut out = Array1::zeros(x.nrows());
        for i in 0..x.nrows() {
            let mut pairs: Vec<(f64, f64)> = member_preds
                .iter()
                .zip(&self.learner_weights)
                .map(|(p, &w)| (p[i], w))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut cumulative = 0.0;
            let mut median = pairs[pairs.len() - 1].0;
            for (value, w) in pairs {
                cumulative += w;
                if cumulative >= half {
                    median = value;
                    break;
                }
            }
            out[i] = median;
        }
        Ok(out)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.learners.is_empty() {
            return None;
        }
        Some(weighted_importances(&self.learners, &self.learner_weights, self.n_features))
    }
}
