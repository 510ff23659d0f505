//! Cross-validated hyperparameter tuning of registry models

use super::config::OptimizationConfig;
use super::optimizer::{Optimizer, TrialResult};
use super::search_space::{params_to_json, SearchSpace, TrialParams};
use crate::autopipeline::ProblemType;
use crate::error::{AutoMlError, Result};
use crate::training::{fit_model, CVStrategy, CrossValidator, ModelParams, ModelType};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Outcome of a tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResult {
    pub model_type: ModelType,
    pub strategy: String,
    pub best_params: Map<String, Value>,
    /// Mean cross-validated MSE of the best trial
    pub best_score: f64,
    pub n_completed: usize,
    pub n_failed: usize,
    pub trials: Vec<TrialResult>,
    pub duration_secs: f64,
}

/// Search space of a tunable family, `None` for the rest
pub fn search_space_for(model_type: ModelType) -> Option<SearchSpace> {
    match model_type {
        ModelType::RandomForest => Some(
            SearchSpace::new()
                .int("n_estimators", 10, 200)
                .int("max_depth", 3, 20)
                .int("min_samples_split", 2, 20)
                .int("min_samples_leaf", 1, 10),
        ),
        ModelType::GradientBoosting => Some(
            SearchSpace::new()
                .int("n_estimators", 10, 200)
                .float("learning_rate", 0.01, 0.3)
                .int("max_depth", 3, 20)
                .int("min_samples_split", 2, 20),
        ),
        ModelType::Svm => Some(
            SearchSpace::new()
                .log_float("C", 0.1, 100.0)
                .categorical("kernel", &["linear", "rbf", "poly"])
                .log_float("gamma", 1e-4, 1.0),
        ),
        _ => None,
    }
}

/// Runs a sequential search minimizing mean fold MSE
#[derive(Debug, Clone)]
pub struct HyperparameterTuner {
    config: OptimizationConfig,
}

impl HyperparameterTuner {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Tune `model` on `(x, y)`. Unsupported families and fold strategies
    /// fail before any trial runs.
    ///
    /// A failing trial is scored as the worst value and the search goes on.
    /// When no trial completes there are no best parameters to report, so
    /// the search fails with `TrainingError` instead of returning the
    /// parameters of an arbitrary failed trial.
    pub fn tune(
        &self,
        model: &str,
        strategy: &str,
        problem: ProblemType,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<TuningResult> {
        let model_type = ModelType::from_identifier(model)
            .map_err(|_| AutoMlError::UnsupportedTuningModel(model.to_string()))?;
        let space = search_space_for(model_type)
            .ok_or_else(|| AutoMlError::UnsupportedTuningModel(model.to_string()))?;

        let cv_strategy = CVStrategy::from_name(strategy, self.config.cv_folds)?;
        if cv_strategy.requires_classes() && !problem.is_classification() {
            return Err(AutoMlError::UnsupportedTuningStrategy(format!(
                "{} (requires a classification target)",
                strategy
            )));
        }
        let folds = CrossValidator::new(cv_strategy)
            .with_random_state(self.config.random_state)
            .split(x.nrows(), Some(y))?;

        info!(
            model = model_type.canonical_name(),
            strategy = cv_strategy.name(),
            trials = self.config.n_trials,
            folds = folds.len(),
            "Starting hyperparameter search"
        );

        let seed = self.config.random_state;
        let objective = |params: &TrialParams| -> Result<f64> {
            let overrides = Value::Object(params_to_json(params));
            let mut model_params = ModelParams::with_overrides(model_type, Some(&overrides))?;
            model_params.set_random_state(seed);

            let mut total = 0.0;
            for fold in &folds {
                let x_train = x.select(Axis(0), &fold.train_indices);
                let y_train = y.select(Axis(0), &fold.train_indices);
                let x_val = x.select(Axis(0), &fold.test_indices);
                let y_val = y.select(Axis(0), &fold.test_indices);

                let fitted = fit_model(model_type, problem, &model_params, &x_train, &y_train)?;
                let pred = fitted.predict(&x_val)?;
                total += mean_squared_error(&y_val, &pred);
            }
            Ok(total / folds.len() as f64)
        };

        let mut optimizer = Optimizer::new(self.config.clone(), space);
        optimizer.optimize(objective);
        let study = optimizer.into_study();

        let best = study.best_trial().ok_or_else(|| {
            AutoMlError::TrainingError(format!(
                "all {} tuning trials failed for {}",
                study.trials.len(),
                model_type.display_name()
            ))
        })?;
        let result = TuningResult {
            model_type,
            strategy: cv_strategy.name().to_string(),
            best_params: params_to_json(&best.params),
            best_score: best.value,
            n_completed: study.n_completed(),
            n_failed: study.n_failed(),
            duration_secs: study.total_duration_secs,
            trials: study.trials.clone(),
        };

        info!(
            model = model_type.canonical_name(),
            best_score = result.best_score,
            failed = result.n_failed,
            "Hyperparameter search finished"
        );
        Ok(result)
    }
}

fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len().max(1) as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i as f64) * 0.25 + j as f64);
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);
        (x, y)
    }

    fn quick() -> HyperparameterTuner {
        HyperparameterTuner::new(OptimizationConfig::new().with_n_trials(4).with_cv_folds(3).with_n_startup_trials(2))
    }

    #[test]
    fn test_tune_random_forest() {
        let (x, y) = regression_data();
        let result = quick()
            .tune("rf", "kfold", ProblemType::Regression, &x, &y)
            .unwrap();
        assert_eq!(result.trials.len(), 4);
        assert!(result.best_score.is_finite());
        assert!(result.best_params.contains_key("n_estimators"));
        let depth = result.best_params["max_depth"].as_i64().unwrap();
        assert!((3..=20).contains(&depth));
    }

    #[test]
    fn test_timeseries_strategy_with_svm() {
        let (x, y) = regression_data();
        let result = quick()
            .tune("svm", "timeseries", ProblemType::Regression, &x, &y)
            .unwrap();
        assert_eq!(result.strategy, "timeseries");
        assert_eq!(result.n_completed + result.n_failed, 4);
    }

    #[test]
    fn test_unsupported_inputs_fail_fast() {
        let (x, y) = regression_data();
        assert!(matches!(
            quick().tune("knn", "kfold", ProblemType::Regression, &x, &y),
            Err(AutoMlError::UnsupportedTuningModel(_))
        ));
        assert!(matches!(
            quick().tune("rf", "loo", ProblemType::Regression, &x, &y),
            Err(AutoMlError::UnsupportedTuningStrategy(_))
        ));
        assert!(matches!(
            quick().tune("rf", "stratified", ProblemType::Regression, &x, &y),
            Err(AutoMlError::UnsupportedTuningStrategy(_))
        ));
    }

    #[test]
    fn test_all_trials_failing_is_an_error() {
        // Boosting needs two classes; every fold here has one
        let x = Array2::from_shape_fn((24, 2), |(i, j)| (i + j) as f64);
        let y = Array1::zeros(24);
        match quick().tune("gb", "kfold", ProblemType::Classification, &x, &y) {
            Err(AutoMlError::TrainingError(msg)) => assert!(msg.contains("all 4 tuning trials failed")),
            other => panic!("expected TrainingError, got {:?}", other.map(|r| r.best_params)),
        }
    }

    #[test]
    fn test_stratified_classification() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 15.0 { 0.0 } else { 1.0 });
        let result = quick()
            .tune("gb", "stratified", ProblemType::Classification, &x, &y)
            .unwrap();
        assert!(result.best_score < 0.5);
    }
}
