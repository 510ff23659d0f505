//! Class balance and feature distribution diagnostics

use crate::autopipeline::TargetSpec;
use crate::data::{ColumnData, Dataset};
use crate::error::{AutoMlError, Result};
use crate::utils::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distribution summary of a numeric feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub skewness: f64,
    pub mean: f64,
    pub std: f64,
    /// |mean| > 1 or std > 1
    pub needs_scaling: bool,
}

/// Bias scan result for pre-training data analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    /// Class proportions (classification only)
    pub class_distribution: Option<BTreeMap<String, f64>>,
    pub class_counts: Option<BTreeMap<String, usize>>,
    /// Largest over smallest class proportion
    pub imbalance_ratio: Option<f64>,
    /// Imbalance ratio above the configured threshold
    pub needs_smote: Option<bool>,
    pub feature_statistics: BTreeMap<String, FeatureStatistics>,
}

/// Read-only bias analyzer
#[derive(Debug, Clone)]
pub struct BiasAnalyzer {
    imbalance_ratio_threshold: f64,
}

impl Default for BiasAnalyzer {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl BiasAnalyzer {
    pub fn new(imbalance_ratio_threshold: f64) -> Self {
        Self {
            imbalance_ratio_threshold,
        }
    }

    pub fn analyze(&self, dataset: &Dataset, target: &TargetSpec) -> Result<BiasReport> {
        if dataset.is_empty() {
            return Err(AutoMlError::EmptyDataset);
        }
        let target_column = dataset.column(&target.column)?;

        let mut report = BiasReport {
            class_distribution: None,
            class_counts: None,
            imbalance_ratio: None,
            needs_smote: None,
            feature_statistics: BTreeMap::new(),
        };

        if target.is_classification() {
            let counts = label_counts(target_column);
            let total: usize = counts.values().sum();
            if total > 0 {
                let distribution: BTreeMap<String, f64> = counts
                    .iter()
                    .map(|(label, &n)| (label.clone(), n as f64 / total as f64))
                    .collect();
                let max = distribution.values().copied().fold(f64::MIN, f64::max);
                let min = distribution.values().copied().fold(f64::MAX, f64::min);
                let ratio = max / min;
                report.imbalance_ratio = Some(ratio);
                report.needs_smote = Some(ratio > self.imbalance_ratio_threshold);
                report.class_distribution = Some(distribution);
            }
            report.class_counts = Some(counts);
        }

        for (name, column) in dataset.iter() {
            if name == target.column {
                continue;
            }
            if let Some(values) = column.numeric_values() {
                report
                    .feature_statistics
                    .insert(name.to_string(), feature_statistics(&values));
            }
        }

        Ok(report)
    }
}

pub(crate) fn feature_statistics(values: &[f64]) -> FeatureStatistics {
    let mean = stats::mean(values).unwrap_or(0.0);
    let std = stats::std_dev(values, 1).unwrap_or(0.0);
    FeatureStatistics {
        skewness: stats::skewness(values).unwrap_or(0.0),
        mean,
        std,
        needs_scaling: mean.abs() > 1.0 || std > 1.0,
    }
}

/// Occurrences of each non-missing label
pub(crate) fn label_counts(column: &ColumnData) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for idx in 0..column.len() {
        if let Some(label) = column.value_label(idx) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autopipeline::ProblemTypeDetector;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            ("income".to_string(), ColumnData::numeric(vec![10.5, 20.0, 30.0, 40.0, 150.0])),
            ("ratio".to_string(), ColumnData::numeric(vec![0.1, 0.2, 0.1, 0.2, 0.1])),
            ("city".to_string(), ColumnData::categorical(vec!["a", "b", "a", "b", "a"])),
            ("churn".to_string(), ColumnData::numeric(vec![0.0, 0.0, 0.0, 0.0, 1.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_class_imbalance() {
        let ds = dataset();
        let target = ProblemTypeDetector::new().detect(&ds, "churn").unwrap();
        let report = BiasAnalyzer::default().analyze(&ds, &target).unwrap();

        let dist = report.class_distribution.unwrap();
        assert!((dist["0"] - 0.8).abs() < 1e-12);
        assert!((report.imbalance_ratio.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(report.needs_smote, Some(true));
        assert_eq!(report.class_counts.unwrap()["1"], 1);
    }

    #[test]
    fn test_feature_statistics() {
        let ds = dataset();
        let target = ProblemTypeDetector::new().detect(&ds, "churn").unwrap();
        let report = BiasAnalyzer::new(5.0).analyze(&ds, &target).unwrap();

        assert_eq!(report.needs_smote, Some(false));
        assert_eq!(report.feature_statistics.len(), 2);
        let income = &report.feature_statistics["income"];
        assert!(income.needs_scaling);
        assert!(income.skewness > 0.0);
        assert!(!report.feature_statistics["ratio"].needs_scaling);
    }

    #[test]
    fn test_regression_has_no_class_report() {
        let ds = dataset();
        let target = ProblemTypeDetector::new().detect(&ds, "income").unwrap();
        let report = BiasAnalyzer::default().analyze(&ds, &target).unwrap();
        assert!(report.class_distribution.is_none());
        assert!(report.feature_statistics.contains_key("churn"));
    }
}
