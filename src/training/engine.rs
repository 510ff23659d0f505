//! Training engine implementation

use super::adaboost::{AdaBoostClassifier, AdaBoostRegressor};
use super::config::{ForestParams, ModelParams, ModelType};
use super::decision_tree::{Criterion, DecisionTree};
use super::extra_trees::ExtraTrees;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
use super::knn::{KNNClassifier, KNNRegressor};
use super::linear_models::{LassoRegression, LinearRegression, LogisticRegression, RidgeRegression};
use super::models::ModelMetrics;
use super::random_forest::{MaxFeatures, RandomForest};
use super::svm::{SVMClassifier, SVMRegressor};
use crate::autopipeline::ProblemType;
use crate::error::{AutoMlError, Result};
use crate::preprocessing::Split;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    /// Random forest or bagging ensemble
    Forest(RandomForest),
    ExtraTrees(ExtraTrees),
    GradientBoostingClassifier(GradientBoostingClassifier),
    GradientBoostingRegressor(GradientBoostingRegressor),
    AdaBoostClassifier(AdaBoostClassifier),
    AdaBoostRegressor(AdaBoostRegressor),
    LinearRegression(LinearRegression),
    LogisticRegression(LogisticRegression),
    LassoRegression(LassoRegression),
    RidgeRegression(RidgeRegression),
    SVMClassifier(SVMClassifier),
    SVMRegressor(SVMRegressor),
    DecisionTree(DecisionTree),
    KNNClassifier(KNNClassifier),
    KNNRegressor(KNNRegressor),
}

fn forest(params: &ForestParams, problem: ProblemType, bagging: bool) -> RandomForest {
    let base = if problem.is_classification() {
        RandomForest::new_classifier(params.n_estimators)
    } else {
        RandomForest::new_regressor(params.n_estimators)
    };
    let base = match (params.max_features, bagging) {
        (Some(mf), _) => base.with_max_features(mf),
        (None, true) => base.with_max_features(MaxFeatures::All),
        (None, false) => base,
    };
    base.with_max_depth(params.max_depth)
        .with_min_samples_split(params.min_samples_split)
        .with_min_samples_leaf(params.min_samples_leaf)
        .with_random_state(params.random_state)
}

impl TrainedModel {
    /// Unfitted estimator for a model family and problem type
    pub fn build(model_type: ModelType, problem: ProblemType, params: &ModelParams) -> Result<Self> {
        model_type.check_compatible(problem)?;
        let classify = problem.is_classification();

        let model = match (model_type, params) {
            (ModelType::RandomForest, ModelParams::Forest(p)) => {
                TrainedModel::Forest(forest(p, problem, false))
            }
            (ModelType::Bagging, ModelParams::Forest(p)) => {
                TrainedModel::Forest(forest(p, problem, true))
            }
            (ModelType::ExtraTrees, ModelParams::Forest(p)) => {
                let mut et = if classify {
                    ExtraTrees::new_classifier(p.n_estimators)
                } else {
                    ExtraTrees::new_regressor(p.n_estimators)
                };
                if let Some(mf) = p.max_features {
                    et = et.with_max_features(mf);
                }
                TrainedModel::ExtraTrees(
                    et.with_max_depth(p.max_depth)
                        .with_min_samples_split(p.min_samples_split)
                        .with_min_samples_leaf(p.min_samples_leaf)
                        .with_random_state(p.random_state),
                )
            }
            (ModelType::GradientBoosting, ModelParams::Boosting(cfg)) => {
                cfg.validate()?;
                if classify {
                    TrainedModel::GradientBoostingClassifier(GradientBoostingClassifier::new(cfg.clone()))
                } else {
                    TrainedModel::GradientBoostingRegressor(GradientBoostingRegressor::new(cfg.clone()))
                }
            }
            (ModelType::AdaBoost, ModelParams::AdaBoost(p)) => {
                if classify {
                    TrainedModel::AdaBoostClassifier(
                        AdaBoostClassifier::new(p.n_estimators, p.learning_rate)
                            .with_random_state(p.random_state),
                    )
                } else {
                    TrainedModel::AdaBoostRegressor(
                        AdaBoostRegressor::new(p.n_estimators, p.learning_rate)
                            .with_random_state(p.random_state),
                    )
                }
            }
            (ModelType::Linear, ModelParams::Linear(p)) => {
                if classify {
                    TrainedModel::LogisticRegression(
                        LogisticRegression::new()
                            .with_alpha(p.alpha)
                            .with_max_iter(p.max_iter)
                            .with_learning_rate(p.learning_rate),
                    )
                } else {
                    TrainedModel::LinearRegression(LinearRegression::new())
                }
            }
            (ModelType::Lasso, ModelParams::Penalized(p)) => TrainedModel::LassoRegression(
                LassoRegression::new(p.alpha).with_max_iter(p.max_iter),
            ),
            (ModelType::Ridge, ModelParams::Penalized(p)) => {
                TrainedModel::RidgeRegression(RidgeRegression::new(p.alpha))
            }
            (ModelType::Svm, ModelParams::Svm(cfg)) => {
                if classify {
                    TrainedModel::SVMClassifier(SVMClassifier::new(cfg.clone()))
                } else {
                    TrainedModel::SVMRegressor(SVMRegressor::new(cfg.clone()))
                }
            }
            (ModelType::DecisionTree, ModelParams::Tree(p)) => {
                let tree = if classify {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                let tree = match (p.criterion, classify) {
                    (None, _) => tree,
                    (Some(Criterion::MSE), false) => tree,
                    (Some(c @ (Criterion::Gini | Criterion::Entropy)), true) => tree.with_criterion(c),
                    (Some(c), _) => {
                        return Err(AutoMlError::invalid_param(
                            "criterion",
                            format!("{:?}", c).to_lowercase(),
                            format!("not applicable to {} problems", problem),
                        ))
                    }
                };
                TrainedModel::DecisionTree(
                    tree.with_max_depth(p.max_depth)
                        .with_min_samples_split(p.min_samples_split)
                        .with_min_samples_leaf(p.min_samples_leaf)
                        .with_random_state(p.random_state),
                )
            }
            (ModelType::Knn, ModelParams::Knn(cfg)) => {
                if classify {
                    TrainedModel::KNNClassifier(KNNClassifier::new(cfg.clone()))
                } else {
                    TrainedModel::KNNRegressor(KNNRegressor::new(cfg.clone()))
                }
            }
            (model_type, _) => {
                return Err(AutoMlError::ConfigError(format!(
                    "parameters do not belong to model type '{}'",
                    model_type.canonical_name()
                )))
            }
        };
        Ok(model)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::Forest(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::ExtraTrees(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::GradientBoostingClassifier(m) => m.fit(x, y),
            TrainedModel::GradientBoostingRegressor(m) => m.fit(x, y),
            TrainedModel::AdaBoostClassifier(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::AdaBoostRegressor(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::LinearRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::LassoRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::RidgeRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::SVMClassifier(m) => m.fit(x, y),
            TrainedModel::SVMRegressor(m) => m.fit(x, y),
            TrainedModel::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::KNNClassifier(m) => m.fit(x, y),
            TrainedModel::KNNRegressor(m) => m.fit(x, y),
        }
    }

    /// Predicted values; class indices for classifiers
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Forest(m) => m.predict(x),
            TrainedModel::ExtraTrees(m) => m.predict(x),
            TrainedModel::GradientBoostingClassifier(m) => m.predict(x),
            TrainedModel::GradientBoostingRegressor(m) => m.predict(x),
            TrainedModel::AdaBoostClassifier(m) => m.predict(x),
            TrainedModel::AdaBoostRegressor(m) => m.predict(x),
            TrainedModel::LinearRegression(m) => m.predict(x),
            TrainedModel::LogisticRegression(m) => m.predict(x),
            TrainedModel::LassoRegression(m) => m.predict(x),
            TrainedModel::RidgeRegression(m) => m.predict(x),
            TrainedModel::SVMClassifier(m) => m.predict(x),
            TrainedModel::SVMRegressor(m) => m.predict(x),
            TrainedModel::DecisionTree(m) => m.predict(x),
            TrainedModel::KNNClassifier(m) => m.predict(x),
            TrainedModel::KNNRegressor(m) => m.predict(x),
        }
    }

    /// Class probabilities, or `None` when the estimator has no probabilistic output
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let proba = match self {
            TrainedModel::Forest(m) if m.is_classification() => m.predict_proba(x)?,
            TrainedModel::ExtraTrees(m) if m.is_classification() => m.predict_proba(x)?,
            TrainedModel::DecisionTree(m) if m.is_classification() => m.predict_proba(x)?,
            TrainedModel::GradientBoostingClassifier(m) => m.predict_proba(x)?,
            TrainedModel::AdaBoostClassifier(m) => m.predict_proba(x)?,
            TrainedModel::LogisticRegression(m) => m.predict_proba(x)?,
            TrainedModel::KNNClassifier(m) => m.predict_proba(x)?,
            _ => return Ok(None),
        };
        Ok(Some(proba))
    }

    /// Per-feature weights in column order, if the estimator exposes any
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::Forest(m) => m.feature_importances().cloned(),
            TrainedModel::ExtraTrees(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoostingClassifier(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoostingRegressor(m) => m.feature_importances().cloned(),
            TrainedModel::AdaBoostClassifier(m) => m.feature_importances(),
            TrainedModel::AdaBoostRegressor(m) => m.feature_importances(),
            TrainedModel::LinearRegression(m) => m.feature_importances(),
            TrainedModel::LogisticRegression(m) => m.feature_importances(),
            TrainedModel::LassoRegression(m) => m.feature_importances(),
            TrainedModel::RidgeRegression(m) => m.feature_importances(),
            TrainedModel::DecisionTree(m) => m.feature_importances().cloned(),
            TrainedModel::SVMClassifier(_)
            | TrainedModel::SVMRegressor(_)
            | TrainedModel::KNNClassifier(_)
            | TrainedModel::KNNRegressor(_) => None,
        }
    }
}

/// Build, fit and return an estimator in one call
pub fn fit_model(
    model_type: ModelType,
    problem: ProblemType,
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<TrainedModel> {
    let mut model = TrainedModel::build(model_type, problem, params)?;
    model.fit(x, y)?;
    Ok(model)
}

/// A single feature's importance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Fitted model together with its held-out evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModelRecord {
    pub model_name: String,
    pub model_type: ModelType,
    pub problem_type: ProblemType,
    pub params: ModelParams,
    pub estimator: TrainedModel,
    /// Metrics on the test partition
    pub metrics: ModelMetrics,
    /// Metrics on the training partition
    pub train_metrics: ModelMetrics,
    /// Test-partition predictions
    pub predictions: Array1<f64>,
    /// Sorted by descending importance; empty when unsupported
    pub feature_importances: Vec<FeatureImportance>,
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub training_time_secs: f64,
}

impl TrainedModelRecord {
    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            model_name: self.model_name.clone(),
            problem_type: self.problem_type,
            metrics: self.metrics.to_map(),
            train_metrics: self.train_metrics.to_map(),
            feature_importances: self.feature_importances.clone(),
            train_shape: self.train_shape,
            test_shape: self.test_shape,
            training_time_secs: self.training_time_secs,
        }
    }
}

/// What `train` hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub problem_type: ProblemType,
    pub metrics: BTreeMap<String, f64>,
    pub train_metrics: BTreeMap<String, f64>,
    pub feature_importances: Vec<FeatureImportance>,
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub training_time_secs: f64,
}

/// Fits models on a preprocessed split and evaluates them
#[derive(Debug, Clone)]
pub struct Trainer {
    problem_type: ProblemType,
}

impl Trainer {
    pub fn new(problem_type: ProblemType) -> Self {
        Self { problem_type }
    }

    pub fn train(
        &self,
        model_type: ModelType,
        params: ModelParams,
        split: &Split,
    ) -> Result<TrainedModelRecord> {
        let start = Instant::now();
        let model_name = model_type.display_name().to_string();
        info!(model = %model_name, problem = %self.problem_type, "Training model");

        let estimator = fit_model(
            model_type,
            self.problem_type,
            &params,
            &split.x_train,
            &split.y_train,
        )?;

        let train_pred = estimator.predict(&split.x_train)?;
        let predictions = estimator.predict(&split.x_test)?;
        let train_metrics = ModelMetrics::compute(self.problem_type, &split.y_train, &train_pred);
        let metrics = ModelMetrics::compute(self.problem_type, &split.y_test, &predictions);

        let feature_importances = estimator
            .feature_importances()
            .map(|imp| rank_importances(&split.feature_names, &imp))
            .unwrap_or_default();
        let training_time_secs = start.elapsed().as_secs_f64();

        let (metric, score) = metrics.primary();
        debug!(model = %model_name, metric, score, secs = training_time_secs, "Model evaluated");

        Ok(TrainedModelRecord {
            model_name,
            model_type,
            problem_type: self.problem_type,
            params,
            estimator,
            metrics,
            train_metrics,
            predictions,
            feature_importances,
            train_shape: split.train_shape(),
            test_shape: split.test_shape(),
            training_time_secs,
        })
    }
}

fn rank_importances(names: &[String], importances: &Array1<f64>) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Split {
        let x_train = array![
            [0.0, 1.0], [0.2, 0.9], [0.1, 1.1], [0.3, 1.0],
            [3.0, 1.0], [3.2, 0.9], [3.1, 1.1], [2.9, 1.0]
        ];
        let y_train = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        Split {
            x_train,
            y_train,
            x_test: array![[0.15, 1.0], [3.05, 1.0]],
            y_test: array![0.0, 1.0],
            feature_names: vec!["signal".to_string(), "noise".to_string()],
        }
    }

    #[test]
    fn test_every_family_trains_on_classification() {
        let split = blobs();
        let trainer = Trainer::new(ProblemType::Classification);
        for &model_type in ModelType::all() {
            if matches!(model_type, ModelType::Lasso | ModelType::Ridge) {
                continue;
            }
            let record = trainer
                .train(model_type, ModelParams::defaults(model_type), &split)
                .unwrap();
            assert_eq!(record.model_name, model_type.display_name());
            assert_eq!(record.metrics.to_map().len(), 4);
            assert_eq!(record.predictions.len(), 2);
            if model_type.capabilities(ProblemType::Classification).supports_importances {
                assert_eq!(record.feature_importances.len(), 2);
            } else {
                assert!(record.feature_importances.is_empty());
            }
        }
    }

    #[test]
    fn test_importances_sorted_descending() {
        let record = Trainer::new(ProblemType::Classification)
            .train(ModelType::RandomForest, ModelParams::defaults(ModelType::RandomForest), &blobs())
            .unwrap();
        assert_eq!(record.feature_importances[0].feature, "signal");
        assert!(record
            .feature_importances
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn test_lasso_rejects_classification() {
        let err = Trainer::new(ProblemType::Classification)
            .train(ModelType::Lasso, ModelParams::defaults(ModelType::Lasso), &blobs())
            .unwrap_err();
        assert!(matches!(err, AutoMlError::IncompatibleModel { .. }));
    }

    #[test]
    fn test_regression_record() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let split = Split {
            x_train: x,
            y_train: y,
            x_test: array![[7.0]],
            y_test: array![14.0],
            feature_names: vec!["x".to_string()],
        };
        let record = Trainer::new(ProblemType::Regression)
            .train(ModelType::Linear, ModelParams::defaults(ModelType::Linear), &split)
            .unwrap();
        assert!((record.predictions[0] - 14.0).abs() < 1e-6);
        let report = record.report();
        assert_eq!(report.metrics["rmse"], report.metrics["mse"].sqrt());
        assert_eq!(report.train_shape, (6, 1));
    }

    #[test]
    fn test_mismatched_params_rejected() {
        let err = TrainedModel::build(
            ModelType::Knn,
            ProblemType::Regression,
            &ModelParams::defaults(ModelType::Svm),
        )
        .unwrap_err();
        assert!(matches!(err, AutoMlError::ConfigError(_)));
    }

    #[test]
    fn test_tree_criterion_checked() {
        let mut params = ModelParams::defaults(ModelType::DecisionTree);
        params
            .apply(serde_json::json!({"criterion": "gini"}).as_object().unwrap())
            .unwrap();
        assert!(TrainedModel::build(ModelType::DecisionTree, ProblemType::Classification, &params).is_ok());
        assert!(TrainedModel::build(ModelType::DecisionTree, ProblemType::Regression, &params).is_err());
    }
}
