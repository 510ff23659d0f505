//! Automatic problem type detection

use crate::data::{ColumnData, Dataset};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of learning problem a target column describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn is_classification(&self) -> bool {
        matches!(self, ProblemType::Classification)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Classification => "classification",
            ProblemType::Regression => "regression",
        }
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target column together with its detected problem type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub column: String,
    pub problem_type: ProblemType,
}

impl TargetSpec {
    pub fn is_classification(&self) -> bool {
        self.problem_type.is_classification()
    }
}

/// Problem type detector
#[derive(Debug, Clone)]
pub struct ProblemTypeDetector {
    /// Maximum distinct integral values for a numeric classification target
    max_classes: usize,
}

impl ProblemTypeDetector {
    /// Create new detector with defaults
    pub fn new() -> Self {
        Self { max_classes: 10 }
    }

    /// Set the maximum number of distinct values treated as classes
    pub fn with_max_classes(mut self, max_classes: usize) -> Self {
        self.max_classes = max_classes;
        self
    }

    /// Classify a column's values.
    ///
    /// Numeric columns are classification only when every observed value is
    /// integral and the distinct count is at most `max_classes`. Non-numeric
    /// columns are always classification.
    pub fn detect_column(&self, column: &ColumnData) -> ProblemType {
        match column {
            ColumnData::Numeric(values) => {
                let observed: Vec<f64> = values.iter().flatten().copied().collect();
                let all_integral = observed.iter().all(|v| v.trunc() == *v);
                let n_unique = observed
                    .iter()
                    .map(|v| v.to_bits())
                    .collect::<HashSet<_>>()
                    .len();

                if all_integral && n_unique <= self.max_classes {
                    ProblemType::Classification
                } else {
                    ProblemType::Regression
                }
            }
            ColumnData::Categorical(_) | ColumnData::DateTime(_) => ProblemType::Classification,
        }
    }

    /// Detect the problem type for a named target column
    pub fn detect(&self, dataset: &Dataset, target: &str) -> Result<TargetSpec> {
        let column = dataset.column(target)?;
        Ok(TargetSpec {
            column: target.to_string(),
            problem_type: self.detect_column(column),
        })
    }
}

impl Default for ProblemTypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutoMlError;

    fn dataset(name: &str, column: ColumnData) -> Dataset {
        Dataset::new(vec![(name.to_string(), column)]).unwrap()
    }

    #[test]
    fn test_integral_low_cardinality_is_classification() {
        let ds = dataset("churn", ColumnData::numeric(vec![0.0, 1.0, 1.0, 0.0]));
        let spec = ProblemTypeDetector::new().detect(&ds, "churn").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Classification);
        assert!(spec.is_classification());
    }

    #[test]
    fn test_fractional_values_are_regression() {
        let ds = dataset("score", ColumnData::numeric(vec![1.5, 2.5, 1.5, 2.5]));
        let spec = ProblemTypeDetector::new().detect(&ds, "score").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Regression);
    }

    #[test]
    fn test_high_cardinality_integers_are_regression() {
        let ds = dataset("count", ColumnData::numeric((0..11).map(|v| v as f64)));
        let spec = ProblemTypeDetector::new().detect(&ds, "count").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Regression);

        let ds = dataset("count", ColumnData::numeric((0..10).map(|v| v as f64)));
        let spec = ProblemTypeDetector::new().detect(&ds, "count").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Classification);
    }

    #[test]
    fn test_strings_are_classification() {
        let values: Vec<String> = (0..50).map(|i| format!("label_{}", i)).collect();
        let ds = dataset("label", ColumnData::categorical(values));
        let spec = ProblemTypeDetector::new().detect(&ds, "label").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Classification);
    }

    #[test]
    fn test_missing_column() {
        let ds = dataset("a", ColumnData::numeric(vec![1.0]));
        let result = ProblemTypeDetector::new().detect(&ds, "b");
        assert!(matches!(result, Err(AutoMlError::ColumnNotFound(_))));
    }

    #[test]
    fn test_custom_class_limit() {
        let ds = dataset("y", ColumnData::numeric((0..20).map(|v| v as f64)));
        let spec = ProblemTypeDetector::new().with_max_classes(25).detect(&ds, "y").unwrap();
        assert_eq!(spec.problem_type, ProblemType::Classification);
    }
}
