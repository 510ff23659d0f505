//! Serialized model artifact

use crate::autopipeline::ProblemType;
use crate::data::{format_number, Dataset};
use crate::error::{AutoMlError, Result};
use crate::preprocessing::PreprocessingPlan;
use crate::training::{ModelMetrics, ModelType, TrainedModel, TrainedModelRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Predictions decoded back into the target's own values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predictions {
    Labels(Vec<String>),
    Values(Vec<f64>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Predictions::Labels(v) => v.len(),
            Predictions::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display form of each prediction
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Predictions::Labels(v) => v.clone(),
            Predictions::Values(v) => v.iter().map(|x| x.to_string()).collect(),
        }
    }
}

/// A trained estimator bundled with the preprocessing it was fitted behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub model_type: ModelType,
    pub problem_type: ProblemType,
    pub estimator: TrainedModel,
    pub plan: PreprocessingPlan,
    /// Class labels in code order (classification only)
    pub class_labels: Option<Vec<String>>,
    /// Held-out metrics at training time
    pub metrics: ModelMetrics,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl ModelArtifact {
    pub fn from_record(record: &TrainedModelRecord, plan: &PreprocessingPlan) -> Self {
        Self {
            model_name: record.model_name.clone(),
            model_type: record.model_type,
            problem_type: record.problem_type,
            estimator: record.estimator.clone(),
            plan: plan.clone(),
            class_labels: plan.class_labels().map(<[String]>::to_vec),
            metrics: record.metrics,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Write the artifact as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        info!(model = %self.model_name, path = %path.display(), "Model artifact saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut artifact: Self = serde_json::from_reader(BufReader::new(file))?;
        artifact.plan.restore();
        Ok(artifact)
    }

    /// Replay the stored preprocessing on `dataset` and predict. A target
    /// column in `dataset` is ignored.
    pub fn predict(&self, dataset: &Dataset) -> Result<Predictions> {
        if dataset.is_empty() {
            return Err(AutoMlError::EmptyDataset);
        }
        let x = self.plan.transform(dataset)?;
        let raw = self.estimator.predict(&x)?;

        if self.problem_type.is_classification() {
            let labels = raw
                .iter()
                .map(|&code| {
                    self.plan
                        .decode_class(code)
                        .unwrap_or_else(|| format_number(code))
                })
                .collect();
            Ok(Predictions::Labels(labels))
        } else {
            Ok(Predictions::Values(raw.to_vec()))
        }
    }
}
