//! Evaluation metrics

use crate::autopipeline::ProblemType;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const CLASSIFICATION_METRICS: [&str; 4] = ["accuracy", "precision", "recall", "f1"];
pub const REGRESSION_METRICS: [&str; 4] = ["r2", "mse", "mae", "rmse"];

/// Metrics for model evaluation; always the complete set for the problem type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "problem_type", rename_all = "lowercase")]
pub enum ModelMetrics {
    Classification {
        accuracy: f64,
        /// Support-weighted mean over classes
        precision: f64,
        recall: f64,
        f1: f64,
    },
    Regression {
        r2: f64,
        mse: f64,
        mae: f64,
        rmse: f64,
    },
}

impl ModelMetrics {
    pub fn compute(problem_type: ProblemType, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        match problem_type {
            ProblemType::Classification => Self::compute_classification(y_true, y_pred),
            ProblemType::Regression => Self::compute_regression(y_true, y_pred),
        }
    }

    /// Accuracy plus support-weighted precision, recall and F1
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return ModelMetrics::Classification {
                accuracy: 0.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
            };
        }

        let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();

        let labels: BTreeSet<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|&v| v.round() as i64)
            .collect();

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for label in labels {
            let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                let is_true = t.round() as i64 == label;
                let is_pred = p.round() as i64 == label;
                match (is_true, is_pred) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let support = tp + fn_;
            if support == 0 {
                continue;
            }
            let p = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
            let r = tp as f64 / support as f64;
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            let weight = support as f64 / n as f64;
            precision += weight * p;
            recall += weight * r;
            f1 += weight * f;
        }

        ModelMetrics::Classification {
            accuracy: correct as f64 / n as f64,
            precision,
            recall,
            f1,
        }
    }

    /// R², MSE, MAE and RMSE (= sqrt(MSE))
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len().max(1) as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        ModelMetrics::Regression {
            r2,
            mse,
            mae,
            rmse: mse.sqrt(),
        }
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            ModelMetrics::Classification { .. } => ProblemType::Classification,
            ModelMetrics::Regression { .. } => ProblemType::Regression,
        }
    }

    pub fn names(&self) -> &'static [&'static str] {
        match self {
            ModelMetrics::Classification { .. } => &CLASSIFICATION_METRICS,
            ModelMetrics::Regression { .. } => &REGRESSION_METRICS,
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match (*self, name) {
            (ModelMetrics::Classification { accuracy, .. }, "accuracy") => Some(accuracy),
            (ModelMetrics::Classification { precision, .. }, "precision") => Some(precision),
            (ModelMetrics::Classification { recall, .. }, "recall") => Some(recall),
            (ModelMetrics::Classification { f1, .. }, "f1") => Some(f1),
            (ModelMetrics::Regression { r2, .. }, "r2") => Some(r2),
            (ModelMetrics::Regression { mse, .. }, "mse") => Some(mse),
            (ModelMetrics::Regression { mae, .. }, "mae") => Some(mae),
            (ModelMetrics::Regression { rmse, .. }, "rmse") => Some(rmse),
            _ => None,
        }
    }

    /// Headline score: accuracy or R²
    pub fn primary(&self) -> (&'static str, f64) {
        match *self {
            ModelMetrics::Classification { accuracy, .. } => ("accuracy", accuracy),
            ModelMetrics::Regression { r2, .. } => ("r2", r2),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.names()
            .iter()
            .filter_map(|name| self.get(name).map(|v| (name.to_string(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_weighted_classification_metrics() {
        let y_true = array![0.0, 0.0, 0.0, 1.0, 1.0, 2.0];
        let y_pred = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let m = ModelMetrics::compute_classification(&y_true, &y_pred);
        let ModelMetrics::Classification { accuracy, precision, recall, f1 } = m else {
            panic!("expected classification metrics");
        };
        assert!((accuracy - 4.0 / 6.0).abs() < 1e-12);
        // class 0: p=1, r=2/3; class 1: p=0.5, r=1; class 2: p=0, r=0
        let expected_precision = 0.5 * 1.0 + (2.0 / 6.0) * 0.5;
        assert!((precision - expected_precision).abs() < 1e-12);
        assert!((recall - accuracy).abs() < 1e-12);
        for v in [accuracy, precision, recall, f1] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_regression_rmse_is_sqrt_mse() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.5, 2.0, 2.0, 4.5];

        let m = ModelMetrics::compute_regression(&y_true, &y_pred);
        assert_eq!(m.get("rmse").unwrap(), m.get("mse").unwrap().sqrt());
        assert!(m.get("r2").unwrap() <= 1.0);
        assert!((m.get("mae").unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_map_keys_match_vocabulary() {
        let m = ModelMetrics::compute(ProblemType::Classification, &array![1.0], &array![1.0]);
        let keys: Vec<String> = m.to_map().into_keys().collect();
        assert_eq!(keys, vec!["accuracy", "f1", "precision", "recall"]);
        assert_eq!(m.primary(), ("accuracy", 1.0));
        assert_eq!(m.get("r2"), None);
    }

    #[test]
    fn test_constant_target_r2() {
        let m = ModelMetrics::compute_regression(&array![2.0, 2.0], &array![2.0, 2.0]);
        assert_eq!(m.get("r2"), Some(1.0));
    }
}
