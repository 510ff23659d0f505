//! Cross-model comparison of trained records

use super::config::ModelType;
use super::engine::TrainedModelRecord;
use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Metrics and held-out predictions of one compared model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model_name: String,
    pub metrics: BTreeMap<String, f64>,
    pub predictions: Vec<f64>,
    pub training_time_secs: f64,
}

/// Result of comparing a set of trained models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub models: Vec<ModelComparison>,
    /// Metrics present for every compared model
    pub common_metrics: Vec<String>,
    /// Requested names with no trained record
    pub skipped: Vec<String>,
}

impl ComparisonTable {
    /// Model names ordered best first by `metric`; errors sort ascending
    pub fn ranking(&self, metric: &str) -> Vec<(String, f64)> {
        let lower_is_better = matches!(metric, "mse" | "mae" | "rmse");
        let mut ranked: Vec<(String, f64)> = self
            .models
            .iter()
            .filter_map(|m| m.metrics.get(metric).map(|v| (m.model_name.clone(), *v)))
            .collect();
        ranked.sort_by(|a, b| {
            let ord = a.1.total_cmp(&b.1);
            if lower_is_better { ord } else { ord.reverse() }
        });
        ranked
    }

    pub fn best(&self, metric: &str) -> Option<(String, f64)> {
        self.ranking(metric).into_iter().next()
    }
}

/// Resolve a requested name to a stored record key. Display names match
/// directly; aliases go through the registry.
fn resolve<'a>(records: &'a BTreeMap<String, TrainedModelRecord>, name: &str) -> Option<&'a str> {
    if let Some((key, _)) = records.get_key_value(name) {
        return Some(key.as_str());
    }
    let model_type = ModelType::from_identifier(name).ok()?;
    records
        .get_key_value(model_type.display_name())
        .map(|(key, _)| key.as_str())
}

/// Compare `names` (all trained models when `None`)
pub fn compare_models(
    records: &BTreeMap<String, TrainedModelRecord>,
    names: Option<&[String]>,
) -> Result<ComparisonTable> {
    if records.is_empty() {
        return Err(AutoMlError::NoModelsAvailable);
    }

    let mut selected: Vec<&str> = Vec::new();
    let mut skipped = Vec::new();
    match names {
        None => selected.extend(records.keys().map(String::as_str)),
        Some(requested) => {
            for name in requested {
                match resolve(records, name) {
                    Some(key) if !selected.contains(&key) => selected.push(key),
                    Some(_) => {}
                    None => {
                        warn!(model = %name, "Model not found among trained models, skipping");
                        skipped.push(name.clone());
                    }
                }
            }
        }
    }

    if selected.is_empty() {
        return Err(AutoMlError::NoModelsAvailable);
    }

    let models: Vec<ModelComparison> = selected
        .iter()
        .filter_map(|key| records.get(*key))
        .map(|record| ModelComparison {
            model_name: record.model_name.clone(),
            metrics: record.metrics.to_map(),
            predictions: record.predictions.to_vec(),
            training_time_secs: record.training_time_secs,
        })
        .collect();

    let mut common: Option<BTreeSet<String>> = None;
    for model in &models {
        let keys: BTreeSet<String> = model.metrics.keys().cloned().collect();
        common = Some(match common {
            None => keys,
            Some(acc) => acc.intersection(&keys).cloned().collect(),
        });
    }

    Ok(ComparisonTable {
        models,
        common_metrics: common.unwrap_or_default().into_iter().collect(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autopipeline::ProblemType;
    use crate::preprocessing::Split;
    use crate::training::{ModelParams, Trainer};
    use ndarray::array;

    fn trained(models: &[ModelType]) -> BTreeMap<String, TrainedModelRecord> {
        let split = Split {
            x_train: array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]],
            y_train: array![1.1, 2.0, 2.9, 4.2, 5.0, 6.1],
            x_test: array![[7.0], [8.0]],
            y_test: array![7.0, 8.1],
            feature_names: vec!["x".to_string()],
        };
        let trainer = Trainer::new(ProblemType::Regression);
        models
            .iter()
            .map(|&m| {
                let record = trainer.train(m, ModelParams::defaults(m), &split).unwrap();
                (record.model_name.clone(), record)
            })
            .collect()
    }

    #[test]
    fn test_compare_all_and_rank() {
        let records = trained(&[ModelType::Linear, ModelType::DecisionTree]);
        let table = compare_models(&records, None).unwrap();
        assert_eq!(table.models.len(), 2);
        assert_eq!(table.common_metrics, vec!["mae", "mse", "r2", "rmse"]);
        // extrapolating beyond the training range favours the linear fit
        assert_eq!(table.best("mse").unwrap().0, "Linear Regression");
        assert_eq!(table.best("r2").unwrap().0, "Linear Regression");
    }

    #[test]
    fn test_unknown_names_skipped() {
        let records = trained(&[ModelType::Linear, ModelType::Ridge]);
        let names = vec!["lr".to_string(), "Nope".to_string(), "Ridge Regression".to_string()];
        let table = compare_models(&records, Some(&names)).unwrap();
        assert_eq!(table.models.len(), 2);
        assert_eq!(table.skipped, vec!["Nope"]);
    }

    #[test]
    fn test_no_models_available() {
        let records = trained(&[ModelType::Linear]);
        let names = vec!["rf".to_string()];
        assert!(matches!(
            compare_models(&records, Some(&names)),
            Err(AutoMlError::NoModelsAvailable)
        ));
        assert!(matches!(
            compare_models(&BTreeMap::new(), None),
            Err(AutoMlError::NoModelsAvailable)
        ));
    }
}
