//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{AutoMlError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// SMOTE oversampler.
///
/// Every class is grown to the majority count by interpolating between a
/// random member and one of its `k` nearest same-class neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: u64,
    /// Target samples per class
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// k nearest members of `data` to `data[query]`, excluding the query itself
    fn find_neighbors(query: usize, data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        let point = &data[query];

        for (i, d) in data.iter().enumerate() {
            if i == query {
                continue;
            }
            let dist = Self::squared_distance(point, d);
            if heap.len() < k {
                heap.push(DistIdx(dist, i));
            } else if let Some(&DistIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistIdx(dist, i));
                }
            }
        }

        let mut neighbors: Vec<DistIdx> = heap.into_vec();
        neighbors.sort();
        neighbors.into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: &[f64], neighbor: &[f64], rng: &mut ChaCha8Rng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);

        if counts.len() < 2 {
            return Err(AutoMlError::PreprocessingError(
                "Need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        self.target_counts = Some(counts.keys().map(|&class| (class, max_count)).collect());
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or(AutoMlError::ModelNotFitted)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let Some(class_idx) = indices.get(&class) else {
                continue;
            };
            let n_to_generate = target_count.saturating_sub(class_idx.len());
            n_synthetic.insert(class, n_to_generate);
            if n_to_generate == 0 {
                continue;
            }

            let class_samples: Vec<Vec<f64>> = class_idx
                .iter()
                .map(|&i| x.row(i).iter().copied().collect())
                .collect();

            // A lone sample has no neighbour to interpolate towards
            if class_samples.len() == 1 {
                for _ in 0..n_to_generate {
                    synthetic_x.push(class_samples[0].clone());
                    synthetic_y.push(class);
                }
                continue;
            }

            let k = self.k_neighbors.min(class_samples.len() - 1);
            let neighbor_lists: Vec<Vec<usize>> = (0..class_samples.len())
                .map(|i| Self::find_neighbors(i, &class_samples, k))
                .collect();

            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_samples.len());
                let neighbors = &neighbor_lists[idx];
                let neighbor_idx = neighbors[rng.gen_range(0..neighbors.len())];
                synthetic_x.push(Self::generate_sample(
                    &class_samples[idx],
                    &class_samples[neighbor_idx],
                    &mut rng,
                ));
                synthetic_y.push(class);
            }
        }

        // Original rows first, synthetic rows appended
        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced() -> (Array2<f64>, Array1<i64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.extend_from_slice(&[i as f64, (i % 5) as f64]);
            labels.push(0);
        }
        for i in 0..4 {
            rows.extend_from_slice(&[100.0 + i as f64, 50.0 + i as f64]);
            labels.push(1);
        }
        (
            Array2::from_shape_vec((24, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = imbalanced();
        let result = SMOTE::new().with_seed(42).fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
        assert_eq!(result.n_synthetic[&1], 16);
        assert_eq!(result.x.nrows(), 40);
    }

    #[test]
    fn test_synthetic_points_lie_between_minority_samples() {
        let (x, y) = imbalanced();
        let result = SMOTE::new().fit_resample(&x, &y).unwrap();

        for row in result.x.rows().into_iter().skip(24) {
            assert!(row[0] >= 100.0 && row[0] <= 103.0);
            assert!(row[1] >= 50.0 && row[1] <= 53.0);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = imbalanced();
        let a = SMOTE::new().with_seed(3).fit_resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(3).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((3, 1));
        let y = Array1::from_vec(vec![1i64, 1, 1]);
        assert!(SMOTE::new().fit_resample(&x, &y).is_err());
    }
}
