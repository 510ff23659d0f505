//! Processing session state machine

use super::artifact::ModelArtifact;
use super::config::SessionConfig;
use crate::analysis::{perform_eda, BiasAnalyzer, BiasReport, EdaReport, LearningCurve, LearningCurveBuilder};
use crate::autopipeline::{ProblemType, ProblemTypeDetector, TargetSpec};
use crate::data::{Dataset, DatasetSummary};
use crate::error::{AutoMlError, Result};
use crate::optimizer::{HyperparameterTuner, OptimizationConfig, TuningResult};
use crate::preprocessing::{PreprocessSummary, PreprocessingPlan, Preprocessor, Split};
use crate::training::{
    compare_models, ComparisonTable, ModelParams, ModelType, TrainedModelRecord, Trainer,
    TrainingReport,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of a successful preprocessing run
#[derive(Debug, Clone)]
struct Prepared {
    split: Split,
    plan: Arc<PreprocessingPlan>,
    summary: PreprocessSummary,
}

/// One dataset's journey from raw table to trained, comparable models.
///
/// Operations must run in order: [`load`](Self::load), then
/// [`set_target`](Self::set_target), then [`preprocess`](Self::preprocess),
/// then any number of [`train`](Self::train) calls. Changing an earlier
/// stage invalidates what was derived from it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: SessionConfig,
    dataset: Option<Dataset>,
    target: Option<TargetSpec>,
    prepared: Option<Prepared>,
    records: BTreeMap<String, TrainedModelRecord>,
    /// Plan each record was trained behind, keyed like `records`
    plans: BTreeMap<String, Arc<PreprocessingPlan>>,
    last_trained: Option<String>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the session dataset. Clears the target, split and every
    /// trained model.
    pub fn load(&mut self, dataset: Dataset) -> Result<DatasetSummary> {
        if dataset.is_empty() {
            return Err(AutoMlError::EmptyDataset);
        }
        let summary = dataset.summary();
        info!(rows = summary.n_rows, cols = summary.n_cols, "Dataset loaded");

        self.dataset = Some(dataset);
        self.target = None;
        self.prepared = None;
        self.records.clear();
        self.plans.clear();
        self.last_trained = None;
        Ok(summary)
    }

    /// Choose the target column and detect the problem type. Any existing
    /// split is discarded.
    pub fn set_target(&mut self, column: &str) -> Result<ProblemType> {
        let dataset = self.dataset.as_ref().ok_or(AutoMlError::EmptyDataset)?;
        let spec = ProblemTypeDetector::new()
            .with_max_classes(self.config.classification_max_unique)
            .detect(dataset, column)?;
        info!(target = column, problem = %spec.problem_type, "Target set");

        let problem = spec.problem_type;
        self.target = Some(spec);
        self.prepared = None;
        Ok(problem)
    }

    /// Preprocess with the configured test fraction and imbalance handling
    pub fn preprocess(&mut self) -> Result<&PreprocessSummary> {
        self.preprocess_with(self.config.test_fraction, self.config.handle_imbalance)
    }

    pub fn preprocess_with(
        &mut self,
        test_fraction: f64,
        handle_imbalance: bool,
    ) -> Result<&PreprocessSummary> {
        let dataset = self.dataset.as_ref().ok_or(AutoMlError::EmptyDataset)?;
        let target = self.target.as_ref().ok_or(AutoMlError::TargetNotSet)?;

        let config = self.config.preprocessing_config(test_fraction, handle_imbalance);
        let output = Preprocessor::new(config).fit_transform(dataset, target)?;
        debug!(steps = output.summary.steps.len(), "Preprocessing plan fitted");

        let prepared = self.prepared.insert(Prepared {
            split: output.split,
            plan: Arc::new(output.plan),
            summary: output.summary,
        });
        Ok(&prepared.summary)
    }

    /// Fit and evaluate `model` on the current split. The record is stored
    /// under the model's display name, replacing any earlier one.
    pub fn train(&mut self, model: &str, params: Option<&Value>) -> Result<TrainingReport> {
        let prepared = self.prepared.as_ref().ok_or(AutoMlError::NotPreprocessed)?;
        let problem = prepared.plan.problem_type();
        let model_type = ModelType::from_identifier(model)?;
        model_type.check_compatible(problem)?;

        let mut model_params = ModelParams::with_overrides(model_type, params)?;
        if !overrides_seed(params) {
            model_params.set_random_state(self.config.random_state);
        }

        let record = Trainer::new(problem).train(model_type, model_params, &prepared.split)?;
        let plan = Arc::clone(&prepared.plan);
        let report = record.report();
        info!(model = %record.model_name, "Model stored");

        self.last_trained = Some(record.model_name.clone());
        self.plans.insert(record.model_name.clone(), plan);
        self.records.insert(record.model_name.clone(), record);
        Ok(report)
    }

    /// Line up trained models; `None` compares all of them
    pub fn compare_models(&self, names: Option<&[String]>) -> Result<ComparisonTable> {
        compare_models(&self.records, names)
    }

    /// Search hyperparameters of `model` with cross-validation on the
    /// training partition
    pub fn tune_hyperparameters(
        &self,
        model: &str,
        n_trials: usize,
        cv_folds: usize,
        strategy: &str,
    ) -> Result<TuningResult> {
        self.tune_with_config(model, strategy, self.config.optimization_config(n_trials, cv_folds))
    }

    pub fn tune_with_config(
        &self,
        model: &str,
        strategy: &str,
        config: OptimizationConfig,
    ) -> Result<TuningResult> {
        let prepared = self.prepared.as_ref().ok_or(AutoMlError::NotPreprocessed)?;
        HyperparameterTuner::new(config).tune(
            model,
            strategy,
            prepared.plan.problem_type(),
            &prepared.split.x_train,
            &prepared.split.y_train,
        )
    }

    /// Persist a trained model with the preprocessing plan it was trained
    /// behind, even if the session has been re-targeted or re-preprocessed
    /// since. Without a name the most recently trained model is saved.
    pub fn save_model(&self, path: impl AsRef<Path>, name: Option<&str>) -> Result<ModelArtifact> {
        let record = match name {
            Some(name) => self.record(name)?,
            None => {
                let last = self.last_trained.as_deref().ok_or(AutoMlError::NoTrainedModel)?;
                self.record(last)?
            }
        };

        let plan = self
            .plans
            .get(&record.model_name)
            .ok_or(AutoMlError::NoTrainedModel)?;

        let artifact = ModelArtifact::from_record(record, plan);
        artifact.save(path)?;
        Ok(artifact)
    }

    pub fn analyze_bias(&self) -> Result<BiasReport> {
        let (dataset, target) = self.dataset_and_target()?;
        BiasAnalyzer::new(self.config.imbalance_ratio_threshold).analyze(dataset, target)
    }

    pub fn perform_eda(&self) -> Result<EdaReport> {
        let (dataset, target) = self.dataset_and_target()?;
        perform_eda(dataset, target)
    }

    /// Cross-validated learning curve of `model` over the training partition
    pub fn learning_curve(&self, model: &str, points: usize) -> Result<LearningCurve> {
        let prepared = self.prepared.as_ref().ok_or(AutoMlError::NotPreprocessed)?;
        let model_type = ModelType::from_identifier(model)?;
        let mut params = ModelParams::defaults(model_type);
        params.set_random_state(self.config.random_state);

        LearningCurveBuilder::new(points)
            .with_random_state(self.config.random_state)
            .build(
                model_type,
                prepared.plan.problem_type(),
                &params,
                &prepared.split.x_train,
                &prepared.split.y_train,
            )
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn target(&self) -> Option<&TargetSpec> {
        self.target.as_ref()
    }

    pub fn problem_type(&self) -> Option<ProblemType> {
        self.target.as_ref().map(|t| t.problem_type)
    }

    pub fn split(&self) -> Option<&Split> {
        self.prepared.as_ref().map(|p| &p.split)
    }

    pub fn plan(&self) -> Option<&PreprocessingPlan> {
        self.prepared.as_ref().map(|p| p.plan.as_ref())
    }

    pub fn preprocess_summary(&self) -> Option<&PreprocessSummary> {
        self.prepared.as_ref().map(|p| &p.summary)
    }

    pub fn is_preprocessed(&self) -> bool {
        self.prepared.is_some()
    }

    /// Display names of the trained models, sorted
    pub fn trained_model_names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> &BTreeMap<String, TrainedModelRecord> {
        &self.records
    }

    /// Look up a trained model by display name or identifier
    pub fn record(&self, name: &str) -> Result<&TrainedModelRecord> {
        if let Some(record) = self.records.get(name) {
            return Ok(record);
        }
        ModelType::from_identifier(name)
            .ok()
            .and_then(|mt| self.records.get(mt.display_name()))
            .ok_or(AutoMlError::NoTrainedModel)
    }

    fn dataset_and_target(&self) -> Result<(&Dataset, &TargetSpec)> {
        let dataset = self.dataset.as_ref().ok_or(AutoMlError::EmptyDataset)?;
        let target = self.target.as_ref().ok_or(AutoMlError::TargetNotSet)?;
        Ok((dataset, target))
    }
}

fn overrides_seed(params: Option<&Value>) -> bool {
    params
        .and_then(Value::as_object)
        .map_or(false, |map| map.keys().any(|k| k.eq_ignore_ascii_case("random_state")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;
    use serde_json::json;

    fn churn_dataset() -> Dataset {
        let n = 40;
        let tenure: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let spend: Vec<f64> = (0..n).map(|i| 20.0 + (i % 7) as f64 * 3.5).collect();
        let plan: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "basic" } else { "pro" }).collect();
        let churn: Vec<&str> = (0..n).map(|i| if i < 20 { "yes" } else { "no" }).collect();
        Dataset::new(vec![
            ("tenure".to_string(), ColumnData::numeric(tenure)),
            ("spend".to_string(), ColumnData::numeric(spend)),
            ("plan".to_string(), ColumnData::categorical(plan)),
            ("churn".to_string(), ColumnData::categorical(churn)),
        ])
        .unwrap()
    }

    fn ready_session() -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.load(churn_dataset()).unwrap();
        session.set_target("churn").unwrap();
        session.preprocess().unwrap();
        session
    }

    #[test]
    fn test_operation_order_is_enforced() {
        let mut session = Session::new(SessionConfig::default());
        assert!(matches!(session.set_target("churn"), Err(AutoMlError::EmptyDataset)));

        session.load(churn_dataset()).unwrap();
        assert!(matches!(session.preprocess(), Err(AutoMlError::TargetNotSet)));
        assert!(matches!(session.train("rf", None), Err(AutoMlError::NotPreprocessed)));
        assert!(matches!(session.set_target("missing"), Err(AutoMlError::ColumnNotFound(_))));
        assert!(matches!(session.analyze_bias(), Err(AutoMlError::TargetNotSet)));
    }

    #[test]
    fn test_set_target_invalidates_split() {
        let mut session = ready_session();
        assert!(session.is_preprocessed());
        assert_eq!(session.set_target("tenure").unwrap(), ProblemType::Regression);
        assert!(session.split().is_none());
        assert!(matches!(session.train("dt", None), Err(AutoMlError::NotPreprocessed)));
    }

    #[test]
    fn test_train_stores_record_by_display_name() {
        let mut session = ready_session();
        let report = session.train("dt", Some(&json!({"max_depth": 3}))).unwrap();
        assert_eq!(report.model_name, "Decision Tree");
        assert!(report.metrics.contains_key("accuracy"));

        session.train("decision_tree", None).unwrap();
        assert_eq!(session.trained_model_names(), vec!["Decision Tree".to_string()]);
        assert!(session.record("dt").is_ok());
    }

    #[test]
    fn test_incompatible_and_unknown_models() {
        let mut session = ready_session();
        assert!(matches!(
            session.train("lasso", None),
            Err(AutoMlError::IncompatibleModel { .. })
        ));
        assert!(matches!(
            session.train("xgboost", None),
            Err(AutoMlError::UnknownModelType { .. })
        ));
        assert!(matches!(
            session.train("rf", Some(&json!({"n_trees": 5}))),
            Err(AutoMlError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_load_clears_everything() {
        let mut session = ready_session();
        session.train("knn", None).unwrap();
        session.load(churn_dataset()).unwrap();
        assert!(session.target().is_none());
        assert!(session.trained_model_names().is_empty());
        assert!(matches!(session.compare_models(None), Err(AutoMlError::NoModelsAvailable)));
    }

    #[test]
    fn test_save_without_models() {
        let session = ready_session();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            session.save_model(dir.path().join("m.json"), None),
            Err(AutoMlError::NoTrainedModel)
        ));
    }

    #[test]
    fn test_diagnostics() {
        let session = ready_session();
        let bias = session.analyze_bias().unwrap();
        assert_eq!(bias.needs_smote, Some(false));
        let eda = session.perform_eda().unwrap();
        assert_eq!(eda.recommendations.encoding, vec!["plan"]);
    }
}
