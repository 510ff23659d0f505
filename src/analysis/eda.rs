//! Exploratory data analysis report

use super::bias::label_counts;
use crate::autopipeline::{ProblemType, TargetSpec};
use crate::data::{Dataset, SemanticType};
use crate::error::{AutoMlError, Result};
use crate::utils::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// More features than this triggers a feature-selection recommendation
const FEATURE_SELECTION_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaSummary {
    pub total_samples: usize,
    /// Column count including the target
    pub num_features: usize,
    pub missing_values: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAnalysis {
    pub semantic_type: SemanticType,
    pub unique_values: usize,
    pub class_distribution: Option<BTreeMap<String, usize>>,
    pub numeric_summary: Option<NumericSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAnalysis {
    pub name: String,
    pub semantic_type: SemanticType,
    pub missing: usize,
    pub unique: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub skew: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recommendations {
    /// Categorical features to encode
    pub encoding: Vec<String>,
    pub scaling: Vec<String>,
    pub imputation: Vec<String>,
    pub feature_selection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaReport {
    pub summary: EdaSummary,
    pub problem_type: ProblemType,
    pub target_analysis: TargetAnalysis,
    /// Features in dataset order
    pub feature_analysis: Vec<FeatureAnalysis>,
    pub recommendations: Recommendations,
}

pub fn perform_eda(dataset: &Dataset, target: &TargetSpec) -> Result<EdaReport> {
    if dataset.is_empty() {
        return Err(AutoMlError::EmptyDataset);
    }
    let target_column = dataset.column(&target.column)?;

    let target_values = target_column.numeric_values();
    let target_analysis = TargetAnalysis {
        semantic_type: target_column.semantic_type(),
        unique_values: target_column.n_unique(),
        class_distribution: (target.is_classification()
            || target_column.semantic_type() == SemanticType::Categorical)
            .then(|| label_counts(target_column)),
        numeric_summary: target_values.as_deref().and_then(numeric_summary),
    };

    let mut feature_analysis = Vec::new();
    let mut recommendations = Recommendations::default();

    for (name, column) in dataset.iter() {
        if name == target.column {
            continue;
        }
        let values = column.numeric_values();
        let mean = values.as_deref().and_then(stats::mean);
        let std = values.as_deref().and_then(|v| stats::std_dev(v, 1));
        let missing = column.null_count();

        match column.semantic_type() {
            SemanticType::Categorical => recommendations.encoding.push(name.to_string()),
            SemanticType::Numeric => {
                if mean.map_or(false, |m| m.abs() > 1.0) || std.map_or(false, |s| s > 1.0) {
                    recommendations.scaling.push(name.to_string());
                }
            }
            SemanticType::DateTime => {}
        }
        if missing > 0 {
            recommendations.imputation.push(name.to_string());
        }

        feature_analysis.push(FeatureAnalysis {
            name: name.to_string(),
            semantic_type: column.semantic_type(),
            missing,
            unique: column.n_unique(),
            mean,
            std,
            skew: values.as_deref().and_then(stats::skewness),
        });
    }
    recommendations.feature_selection = dataset.n_cols() > FEATURE_SELECTION_THRESHOLD;

    Ok(EdaReport {
        summary: EdaSummary {
            total_samples: dataset.n_rows(),
            num_features: dataset.n_cols(),
            missing_values: dataset.total_missing(),
        },
        problem_type: target.problem_type,
        target_analysis,
        feature_analysis,
        recommendations,
    })
}

fn numeric_summary(values: &[f64]) -> Option<NumericSummary> {
    Some(NumericSummary {
        mean: stats::mean(values)?,
        std: stats::std_dev(values, 1).unwrap_or(0.0),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autopipeline::ProblemTypeDetector;
    use crate::data::ColumnData;

    #[test]
    fn test_eda_report() {
        let ds = Dataset::new(vec![
            (
                "age".to_string(),
                ColumnData::Numeric(vec![Some(25.0), None, Some(40.0), Some(33.0)]),
            ),
            ("score".to_string(), ColumnData::numeric(vec![0.1, 0.2, 0.3, 0.2])),
            ("plan".to_string(), ColumnData::categorical(vec!["a", "b", "a", "a"])),
            ("price".to_string(), ColumnData::numeric(vec![9.5, 12.25, 30.0, 7.75])),
        ])
        .unwrap();
        let target = ProblemTypeDetector::new().detect(&ds, "price").unwrap();
        let report = perform_eda(&ds, &target).unwrap();

        assert_eq!(report.summary.total_samples, 4);
        assert_eq!(report.summary.num_features, 4);
        assert_eq!(report.summary.missing_values, 1);
        assert_eq!(report.problem_type, ProblemType::Regression);
        assert!(report.target_analysis.class_distribution.is_none());
        assert_eq!(report.target_analysis.numeric_summary.as_ref().unwrap().max, 30.0);

        let names: Vec<&str> = report.feature_analysis.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["age", "score", "plan"]);
        assert_eq!(report.recommendations.encoding, vec!["plan"]);
        assert_eq!(report.recommendations.scaling, vec!["age"]);
        assert_eq!(report.recommendations.imputation, vec!["age"]);
        assert!(!report.recommendations.feature_selection);
    }

    #[test]
    fn test_classification_target_distribution() {
        let ds = Dataset::new(vec![
            ("x".to_string(), ColumnData::numeric(vec![1.0, 2.0, 3.0])),
            ("label".to_string(), ColumnData::categorical(vec!["yes", "no", "yes"])),
        ])
        .unwrap();
        let target = ProblemTypeDetector::new().detect(&ds, "label").unwrap();
        let report = perform_eda(&ds, &target).unwrap();
        let dist = report.target_analysis.class_distribution.unwrap();
        assert_eq!(dist["yes"], 2);
        assert!(report.target_analysis.numeric_summary.is_none());
    }
}
