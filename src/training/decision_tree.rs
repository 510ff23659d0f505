//! Decision tree learner shared by the tree ensembles

use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value and class probabilities
    Leaf {
        value: f64,
        proba: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Threshold search strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Splitter {
    /// Scan every distinct threshold of every candidate feature
    Best,
    /// Draw one uniform threshold per candidate feature (extremely randomized trees)
    Random,
}

/// Weighted target statistics of a set of samples
#[derive(Debug, Clone)]
enum NodeStats {
    Class { counts: Vec<f64>, weight: f64 },
    Reg { weight: f64, sum: f64, sum_sq: f64 },
}

impl NodeStats {
    fn empty(n_classes: Option<usize>) -> Self {
        match n_classes {
            Some(k) => NodeStats::Class {
                counts: vec![0.0; k],
                weight: 0.0,
            },
            None => NodeStats::Reg {
                weight: 0.0,
                sum: 0.0,
                sum_sq: 0.0,
            },
        }
    }

    fn push(&mut self, y: f64, w: f64) {
        match self {
            NodeStats::Class { counts, weight } => {
                counts[y as usize] += w;
                *weight += w;
            }
            NodeStats::Reg { weight, sum, sum_sq } => {
                *weight += w;
                *sum += w * y;
                *sum_sq += w * y * y;
            }
        }
    }

    fn weight(&self) -> f64 {
        match self {
            NodeStats::Class { weight, .. } | NodeStats::Reg { weight, .. } => *weight,
        }
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        match (self, other) {
            (
                NodeStats::Class { counts, weight },
                NodeStats::Class {
                    counts: oc,
                    weight: ow,
                },
            ) => NodeStats::Class {
                counts: counts.iter().zip(oc).map(|(a, b)| a - b).collect(),
                weight: weight - ow,
            },
            (
                NodeStats::Reg { weight, sum, sum_sq },
                NodeStats::Reg {
                    weight: ow,
                    sum: os,
                    sum_sq: oss,
                },
            ) => NodeStats::Reg {
                weight: weight - ow,
                sum: sum - os,
                sum_sq: sum_sq - oss,
            },
            _ => self.clone(),
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        match self {
            NodeStats::Class { counts, weight } => {
                if *weight <= 0.0 {
                    return 0.0;
                }
                match criterion {
                    Criterion::Entropy => counts
                        .iter()
                        .filter(|&&c| c > 0.0)
                        .map(|&c| {
                            let p = c / weight;
                            -p * p.log2()
                        })
                        .sum(),
                    _ => 1.0 - counts.iter().map(|&c| (c / weight).powi(2)).sum::<f64>(),
                }
            }
            NodeStats::Reg { weight, sum, sum_sq } => {
                if *weight <= 0.0 {
                    return 0.0;
                }
                let mean = sum / weight;
                (sum_sq / weight - mean * mean).max(0.0)
            }
        }
    }

    /// Leaf prediction: majority class (ties to the lowest index) or weighted mean
    fn leaf(&self, n_samples: usize) -> TreeNode {
        match self {
            NodeStats::Class { counts, weight } => {
                let mut best = 0;
                for (c, &count) in counts.iter().enumerate() {
                    if count > counts[best] {
                        best = c;
                    }
                }
                let proba = if *weight > 0.0 {
                    counts.iter().map(|c| c / weight).collect()
                } else {
                    vec![1.0 / counts.len().max(1) as f64; counts.len()]
                };
                TreeNode::Leaf {
                    value: best as f64,
                    proba,
                    n_samples,
                }
            }
            NodeStats::Reg { weight, sum, .. } => TreeNode::Leaf {
                value: if *weight > 0.0 { sum / weight } else { 0.0 },
                proba: Vec::new(),
                n_samples,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn per node (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    pub splitter: Splitter,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: 42,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
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

    /// Reserve room for at least `n_classes` classes, even if some are absent from `y`
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_weighted(x, y, None)
    }

    /// Fit with per-sample weights (uniform when `None`)
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
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
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        let weights = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(AutoMlError::ShapeError {
                    expected: format!("sample_weight length = {}", n_samples),
                    actual: format!("sample_weight length = {}", w.len()),
                })
            }
            Some(w) => w.to_vec(),
            None => vec![1.0; n_samples],
        };

        if self.is_classification {
            self.n_classes = self.n_classes.max(class_count(y)?);
        }
        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        let ctx = FitContext {
            x,
            y,
            weights: &weights,
            total_weight: weights.iter().sum(),
        };
        let root = self.build_tree(&ctx, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn node_stats(&self, ctx: &FitContext<'_>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::empty(self.is_classification.then_some(self.n_classes));
        for &i in indices {
            stats.push(ctx.y[i], ctx.weights[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(ctx, indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return stats.leaf(n_samples);
        }

        let features = self.candidate_features(rng);
        let best = match self.splitter {
            Splitter::Best => self.best_split(ctx, indices, &stats, impurity, &features),
            Splitter::Random => self.random_split(ctx, indices, &stats, impurity, &features, rng),
        };

        let Some(best) = best else {
            return stats.leaf(n_samples);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain * stats.weight() / ctx.total_weight;

        let left = self.build_tree(ctx, &left_idx, depth + 1, importances, rng);
        let right = self.build_tree(ctx, &right_idx, depth + 1, importances, rng);

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m > 0 && m < self.n_features => {
                let mut picked = sample(rng, self.n_features, m).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sort-and-sweep over each candidate feature
    fn best_split(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let candidates: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&f| {
                let mut order = indices.to_vec();
                order.sort_by(|&a, &b| ctx.x[[a, f]].total_cmp(&ctx.x[[b, f]]));

                let mut left = NodeStats::empty(self.is_classification.then_some(self.n_classes));
                let mut best: Option<SplitCandidate> = None;
                for pos in 0..n - 1 {
                    let i = order[pos];
                    left.push(ctx.y[i], ctx.weights[i]);

                    let n_left = pos + 1;
                    if n_left < min_leaf || n - n_left < min_leaf {
                        continue;
                    }
                    let xv = ctx.x[[i, f]];
                    let xn = ctx.x[[order[pos + 1], f]];
                    if xn <= xv {
                        continue;
                    }

                    let gain = split_gain(parent, parent_impurity, &left, self.criterion);
                    if best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx: f,
                            threshold: xv + (xn - xv) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        pick_best(candidates)
    }

    /// One uniform threshold per candidate feature between its node min and max
    fn random_split(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
        features: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let draws: Vec<(usize, f64)> = features.iter().map(|&f| (f, rng.gen::<f64>())).collect();
        let min_leaf = self.min_samples_leaf;

        let candidates: Vec<Option<SplitCandidate>> = draws
            .par_iter()
            .map(|&(f, u)| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = ctx.x[[i, f]];
                    (lo.min(v), hi.max(v))
                });
                if !(hi > lo) {
                    return None;
                }
                let threshold = lo + u * (hi - lo);

                let mut left = NodeStats::empty(self.is_classification.then_some(self.n_classes));
                let mut n_left = 0;
                for &i in indices {
                    if ctx.x[[i, f]] <= threshold {
                        left.push(ctx.y[i], ctx.weights[i]);
                        n_left += 1;
                    }
                }
                if n_left < min_leaf || indices.len() - n_left < min_leaf {
                    return None;
                }
                Some(SplitCandidate {
                    feature_idx: f,
                    threshold,
                    gain: split_gain(parent, parent_impurity, &left, self.criterion),
                })
            })
            .collect();

        pick_best(candidates)
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Predict class index (classification) or value (regression)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.check_input(x)?;
        let predictions: Vec<f64> = x
            .outer_iter()
            .map(|row| match Self::leaf_for(root, &row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Class probabilities, one column per class index
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(AutoMlError::TrainingError(
                "predict_proba is only available for classification trees".to_string(),
            ));
        }
        let root = self.check_input(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (r, row) in x.outer_iter().enumerate() {
            if let TreeNode::Leaf { proba: p, .. } = Self::leaf_for(root, &row) {
                for (c, &v) in p.iter().enumerate() {
                    proba[[r, c]] = v;
                }
            }
        }
        Ok(proba)
    }

    fn leaf_for<'a>(mut node: &'a TreeNode, row: &ArrayView1<'_, f64>) -> &'a TreeNode {
        while let TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } = node
        {
            node = if row[*feature_idx] <= *threshold { left } else { right };
        }
        node
    }

    /// Normalised impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

struct FitContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    weights: &'a [f64],
    total_weight: f64,
}

fn split_gain(parent: &NodeStats, parent_impurity: f64, left: &NodeStats, criterion: Criterion) -> f64 {
    let right = parent.minus(left);
    let total = parent.weight();
    if total <= 0.0 {
        return 0.0;
    }
    let child = (left.weight() * left.impurity(criterion) + right.weight() * right.impurity(criterion)) / total;
    parent_impurity - child
}

/// Highest gain wins; ties keep the lowest feature index
fn pick_best(candidates: Vec<Option<SplitCandidate>>) -> Option<SplitCandidate> {
    candidates
        .into_iter()
        .flatten()
        .filter(|c| c.gain > 1e-12)
        .fold(None, |acc: Option<SplitCandidate>, c| match acc {
            Some(a) if a.gain >= c.gain => Some(a),
            _ => Some(c),
        })
}

/// Number of classes implied by class-index targets
pub(crate) fn class_count(y: &Array1<f64>) -> Result<usize> {
    let mut max = 0usize;
    for &v in y.iter() {
        if !(v >= 0.0) || v.fract() != 0.0 {
            return Err(AutoMlError::TrainingError(format!(
                "classification targets must be non-negative class indices, got {}",
                v
            )));
        }
        max = max.max(v as usize);
    }
    Ok(if y.is_empty() { 0 } else { max + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [7.0, 1.0], [8.0, 0.0], [9.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let preds = tree.predict(&x).unwrap();
        assert_eq!(preds, y);
        assert_eq!(tree.depth(), 1);

        let imp = tree.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_regressor_fits_step() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(Some(3));
        tree.fit(&x, &y).unwrap();

        let preds = tree.predict(&array![[2.5], [11.5]]).unwrap();
        assert!((preds[0] - 5.0).abs() < 1e-9);
        assert!((preds[1] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0], [0.0], [1.0], [1.0], [2.0]];
        let y = array![0.0, 1.0, 1.0, 2.0, 2.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sample_weights_shift_majority() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![0.0, 1.0, 1.0];
        let w = array![10.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_weighted(&x, &y, Some(&w)).unwrap();
        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 0.0);
    }

    #[test]
    fn test_random_splitter_is_seeded() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 9.0], [6.0, 2.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let fit = |seed| {
            let mut tree = DecisionTree::new_regressor()
                .with_splitter(Splitter::Random)
                .with_random_state(seed);
            tree.fit(&x, &y).unwrap();
            tree.predict(&array![[2.5, 4.0], [4.5, 6.0]]).unwrap()
        };
        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(AutoMlError::ModelNotFitted)));

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&array![[1.0], [2.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0, 2.0]]),
            Err(AutoMlError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_rejects_non_index_class_targets() {
        let mut tree = DecisionTree::new_classifier();
        let err = tree.fit(&array![[1.0], [2.0]], &array![0.5, 1.0]).unwrap_err();
        assert!(matches!(err, AutoMlError::TrainingError(_)));
    }
}
