//! Thread-safe session handle

use super::artifact::ModelArtifact;
use super::config::SessionConfig;
use super::session::Session;
use crate::analysis::{BiasReport, EdaReport, LearningCurve};
use crate::autopipeline::ProblemType;
use crate::data::{Dataset, DatasetSummary};
use crate::error::Result;
use crate::optimizer::TuningResult;
use crate::preprocessing::PreprocessSummary;
use crate::training::{ComparisonTable, TrainingReport};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Cloneable handle to one session. Mutating operations take the write
/// lock so they run one at a time; diagnostics share the read lock.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::from_session(Session::new(config))
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write()
    }

    pub fn load(&self, dataset: Dataset) -> Result<DatasetSummary> {
        self.write().load(dataset)
    }

    pub fn set_target(&self, column: &str) -> Result<ProblemType> {
        self.write().set_target(column)
    }

    pub fn preprocess(&self, test_fraction: f64, handle_imbalance: bool) -> Result<PreprocessSummary> {
        self.write()
            .preprocess_with(test_fraction, handle_imbalance)
            .cloned()
    }

    pub fn train(&self, model: &str, params: Option<&Value>) -> Result<TrainingReport> {
        self.write().train(model, params)
    }

    pub fn compare_models(&self, names: Option<&[String]>) -> Result<ComparisonTable> {
        self.read().compare_models(names)
    }

    /// Holds the read lock for the whole search, so training waits for it
    pub fn tune_hyperparameters(
        &self,
        model: &str,
        n_trials: usize,
        cv_folds: usize,
        strategy: &str,
    ) -> Result<TuningResult> {
        self.read()
            .tune_hyperparameters(model, n_trials, cv_folds, strategy)
    }

    pub fn save_model(&self, path: impl AsRef<Path>, name: Option<&str>) -> Result<ModelArtifact> {
        self.read().save_model(path, name)
    }

    pub fn analyze_bias(&self) -> Result<BiasReport> {
        self.read().analyze_bias()
    }

    pub fn perform_eda(&self) -> Result<EdaReport> {
        self.read().perform_eda()
    }

    pub fn learning_curve(&self, model: &str, points: usize) -> Result<LearningCurve> {
        self.read().learning_curve(model, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;
    use std::thread;

    #[test]
    fn test_concurrent_readers_after_training() {
        let n = 30;
        let x: Vec<f64> = (0..n).map(|i| i as f64 * 0.7).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.5 * v + 0.25).collect();
        let dataset = Dataset::new(vec![
            ("x".to_string(), ColumnData::numeric(x)),
            ("y".to_string(), ColumnData::numeric(y)),
        ])
        .unwrap();

        let shared = SharedSession::new(SessionConfig::default());
        shared.load(dataset).unwrap();
        assert_eq!(shared.set_target("y").unwrap(), ProblemType::Regression);
        shared.preprocess(0.2, false).unwrap();
        shared.train("lr", None).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let handle = shared.clone();
                thread::spawn(move || handle.compare_models(None).map(|t| t.models.len()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 1);
        }
        assert_eq!(shared.read().trained_model_names(), vec!["Linear Regression".to_string()]);
    }
}
