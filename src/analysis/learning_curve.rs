//! Learning curves over growing training subsets

use crate::autopipeline::ProblemType;
use crate::error::{AutoMlError, Result};
use crate::training::{fit_model, CVStrategy, CrossValidator, ModelMetrics, ModelParams, ModelType};
use crate::utils::stats;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SMALLEST_FRACTION: f64 = 0.1;

/// Mean and spread of the primary metric at one training size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningCurvePoint {
    pub train_size: usize,
    pub train_score_mean: f64,
    pub train_score_std: f64,
    pub validation_score_mean: f64,
    pub validation_score_std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningCurve {
    pub model_name: String,
    /// accuracy or r2
    pub metric: String,
    pub points: Vec<LearningCurvePoint>,
}

/// Cross-validated learning curve builder
#[derive(Debug, Clone)]
pub struct LearningCurveBuilder {
    n_points: usize,
    cv_folds: usize,
    random_state: u64,
}

impl LearningCurveBuilder {
    pub fn new(n_points: usize) -> Self {
        Self {
            n_points,
            cv_folds: 5,
            random_state: 42,
        }
    }

    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fractions of each fold's training rows, evenly spaced from 0.1 to 1.0
    pub fn fractions(&self) -> Vec<f64> {
        match self.n_points {
            0 => Vec::new(),
            1 => vec![1.0],
            n => (0..n)
                .map(|i| SMALLEST_FRACTION + (1.0 - SMALLEST_FRACTION) * i as f64 / (n - 1) as f64)
                .collect(),
        }
    }

    /// Score `model_type` on prefixes of every fold's training rows. Sizes
    /// where every fold fails to fit are left out of the curve.
    pub fn build(
        &self,
        model_type: ModelType,
        problem: ProblemType,
        params: &ModelParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<LearningCurve> {
        if self.n_points == 0 {
            return Err(AutoMlError::invalid_param(
                "points",
                self.n_points,
                "learning curve needs at least one point",
            ));
        }
        model_type.check_compatible(problem)?;

        let strategy = if problem.is_classification() {
            CVStrategy::StratifiedKFold { n_splits: self.cv_folds, shuffle: true }
        } else {
            CVStrategy::KFold { n_splits: self.cv_folds, shuffle: true }
        };
        let folds = CrossValidator::new(strategy)
            .with_random_state(self.random_state)
            .split(x.nrows(), Some(y))?;

        let mut points = Vec::new();
        for fraction in self.fractions() {
            let scores: Vec<(f64, f64)> = folds
                .par_iter()
                .filter_map(|fold| {
                    let n_train = ((fold.train_indices.len() as f64 * fraction).ceil() as usize)
                        .clamp(1, fold.train_indices.len());
                    let subset = &fold.train_indices[..n_train];
                    match score_fold(model_type, problem, params, x, y, subset, &fold.test_indices) {
                        Ok(pair) => Some(pair),
                        Err(e) => {
                            warn!(fold = fold.fold_idx, fraction, error = %e, "Learning curve fit failed");
                            None
                        }
                    }
                })
                .collect();
            if scores.is_empty() {
                continue;
            }

            let train: Vec<f64> = scores.iter().map(|s| s.0).collect();
            let validation: Vec<f64> = scores.iter().map(|s| s.1).collect();
            let train_size = folds
                .first()
                .map(|f| ((f.train_indices.len() as f64 * fraction).ceil() as usize).max(1))
                .unwrap_or(0);
            debug!(train_size, folds = scores.len(), "Learning curve point");
            points.push(LearningCurvePoint {
                train_size,
                train_score_mean: stats::mean(&train).unwrap_or(f64::NAN),
                train_score_std: stats::std_dev(&train, 0).unwrap_or(0.0),
                validation_score_mean: stats::mean(&validation).unwrap_or(f64::NAN),
                validation_score_std: stats::std_dev(&validation, 0).unwrap_or(0.0),
            });
        }

        if points.is_empty() {
            return Err(AutoMlError::TrainingError(format!(
                "no learning curve point could be fitted for {}",
                model_type.display_name()
            )));
        }

        let metric = match problem {
            ProblemType::Classification => "accuracy",
            ProblemType::Regression => "r2",
        };
        Ok(LearningCurve {
            model_name: model_type.display_name().to_string(),
            metric: metric.to_string(),
            points,
        })
    }
}

fn score_fold(
    model_type: ModelType,
    problem: ProblemType,
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    train_idx: &[usize],
    test_idx: &[usize],
) -> Result<(f64, f64)> {
    let x_train = x.select(Axis(0), train_idx);
    let y_train = y.select(Axis(0), train_idx);
    let x_val = x.select(Axis(0), test_idx);
    let y_val = y.select(Axis(0), test_idx);

    let model = fit_model(model_type, problem, params, &x_train, &y_train)?;
    let train_score = ModelMetrics::compute(problem, &y_train, &model.predict(&x_train)?).primary().1;
    let val_score = ModelMetrics::compute(problem, &y_val, &model.predict(&x_val)?).primary().1;
    Ok((train_score, val_score))
}
