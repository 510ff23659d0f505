//! K-Nearest Neighbors implementation
//!
//! KNN classifier and regressor with distance metrics. Queries run in
//! parallel over the rows being predicted.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::decision_tree::class_count;
use super::random_forest::argmax;
use crate::error::{AutoMlError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// Stored training set shared by both estimators
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memory {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Memory {
    fn new(config: &KNNConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if config.n_neighbors == 0 {
            return Err(AutoMlError::invalid_param("n_neighbors", 0, "must be at least 1"));
        }
        if x.nrows() == 0 {
            return Err(AutoMlError::TrainingError(
                "cannot fit KNN on zero samples".to_string(),
            ));
        }
        Ok(Self {
            x: x.clone(),
            y: y.clone(),
        })
    }

    /// Neighbours of every query row as `(distance, label)` pairs
    fn query(&self, x: &Array2<f64>, config: &KNNConfig) -> Result<Vec<Vec<(f64, f64)>>> {
        if x.ncols() != self.x.ncols() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} features", self.x.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let k = config.n_neighbors.min(self.x.nrows());
        Ok(x.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| find_k_nearest(row, &self.x, &self.y, k, config.metric))
            .collect())
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    memory: Option<Memory>,
    n_classes: usize,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            memory: None,
            n_classes: 0,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.n_classes = class_count(y)?;
        self.memory = Some(Memory::new(&self.config, x, y)?);
        Ok(())
    }

    /// Predict class probabilities from neighbour votes
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let memory = self.memory.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        let neighbours = memory.query(x, &self.config)?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (r, nbrs) in neighbours.iter().enumerate() {
            let votes = class_votes(nbrs, self.n_classes, self.config.weights);
            let total: f64 = votes.iter().sum();
            for (c, v) in votes.into_iter().enumerate() {
                proba[[r, c]] = if total > 0.0 { v / total } else { 0.0 };
            }
        }
        Ok(proba)
    }

    /// Predict class labels; ties resolve to the lowest class index
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.map_axis(Axis(1), |row| argmax(row.iter().copied()) as f64))
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    memory: Option<Memory>,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self { config, memory: None }
    }

    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.memory = Some(Memory::new(&self.config, x, y)?);
        Ok(())
    }

    /// Mean (or inverse-distance weighted mean) of the neighbour targets
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let memory = self.memory.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        let neighbours = memory.query(x, &self.config)?;
        Ok(neighbours
            .iter()
            .map(|nbrs| weighted_mean(nbrs, self.config.weights))
            .collect())
    }
}

/// Max-heap entry: distance first, then training index for a stable order
#[derive(PartialEq)]
struct DistLabel {
    dist: f64,
    idx: usize,
    label: f64,
}

impl Eq for DistLabel {}

impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

/// k nearest training rows via a bounded max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<'_, f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (idx, row) in x_train.outer_iter().enumerate() {
        let entry = DistLabel {
            dist: compute_distance(point, row, metric),
            idx,
            label: y_train[idx],
        };
        if heap.len() < k {
            heap.push(entry);
        } else if heap.peek().map_or(false, |top| entry < *top) {
            heap.pop();
            heap.push(entry);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|e| (e.dist, e.label))
        .collect()
}

fn compute_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, metric: DistanceMetric) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(p, q)| (p - q).abs());
    match metric {
        DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => diffs.sum(),
        DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

fn neighbour_weights(neighbours: &[(f64, f64)], scheme: WeightScheme) -> Vec<f64> {
    match scheme {
        WeightScheme::Uniform => vec![1.0; neighbours.len()],
        WeightScheme::Distance => {
            // exact matches take all the weight
            if neighbours.iter().any(|(d, _)| *d == 0.0) {
                neighbours
                    .iter()
                    .map(|(d, _)| if *d == 0.0 { 1.0 } else { 0.0 })
                    .collect()
            } else {
                neighbours.iter().map(|(d, _)| 1.0 / d).collect()
            }
        }
    }
}

fn class_votes(neighbours: &[(f64, f64)], n_classes: usize, scheme: WeightScheme) -> Vec<f64> {
    let mut votes = vec![0.0; n_classes];
    for ((_, label), w) in neighbours.iter().zip(neighbour_weights(neighbours, scheme)) {
        let c = *label as usize;
        if c < n_classes {
            votes[c] += w;
        }
    }
    votes
}

fn weighted_mean(neighbours: &[(f64, f64)], scheme: WeightScheme) -> f64 {
    let weights = neighbour_weights(neighbours, scheme);
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    neighbours
        .iter()
        .zip(&weights)
        .map(|((_, y), w)| y * w)
        .sum::<f64>()
        / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_majority_vote() {
        let x = array![[0.0], [0.1], [0.2], [5.0], [5.1], [5.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[0.05], [5.05]]).unwrap(), array![0.0, 1.0]);

        let proba = knn.predict_proba(&array![[0.05]]).unwrap();
        assert!((proba[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_regressor_mean_and_distance_weights() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![0.0, 10.0, 20.0, 100.0];

        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();
        assert!((knn.predict(&array![[1.0]]).unwrap()[0] - 10.0).abs() < 1e-12);

        let mut weighted = KNNRegressor::new(KNNConfig {
            n_neighbors: 2,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        weighted.fit(&x, &y).unwrap();
        // exact match dominates
        assert_eq!(weighted.predict(&array![[2.0]]).unwrap()[0], 20.0);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let mut knn = KNNClassifier::with_k(10);
        knn.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();
        assert_eq!(knn.predict(&array![[0.0]]).unwrap().len(), 1);
    }

    #[test]
    fn test_errors() {
        let knn = KNNRegressor::with_k(3);
        assert!(matches!(knn.predict(&array![[1.0]]), Err(AutoMlError::ModelNotFitted)));

        let mut knn = KNNRegressor::with_k(0);
        assert!(matches!(
            knn.fit(&array![[1.0]], &array![1.0]),
            Err(AutoMlError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_manhattan_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Manhattan), 7.0);
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Euclidean), 5.0);
    }
}
