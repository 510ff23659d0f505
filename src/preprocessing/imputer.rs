//! Missing value imputation

use crate::error::{AutoMlError, Result};
use crate::utils::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Imputation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with mode / most frequent value
    MostFrequent,
}

/// Value substituted for a missing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Category(String),
}

/// Per-column imputer. Statistics are fitted once and reused verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    fills: BTreeMap<String, FillValue>,
}

impl Imputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a numeric column on the given rows
    pub fn fit_numeric(
        &mut self,
        name: &str,
        values: &[Option<f64>],
        rows: &[usize],
        strategy: ImputeStrategy,
    ) {
        let observed: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
        let fill = match strategy {
            ImputeStrategy::Mean => stats::mean(&observed),
            ImputeStrategy::MostFrequent => stats::numeric_mode(&observed),
        };
        // An all-missing column falls back to zero
        self.fills
            .insert(name.to_string(), FillValue::Number(fill.unwrap_or(0.0)));
    }

    /// Fit a categorical column on the given rows with the most frequent value
    pub fn fit_categorical(&mut self, name: &str, values: &[Option<String>], rows: &[usize]) {
        let fill = stats::string_mode(rows.iter().filter_map(|&i| values[i].as_deref()));
        self.fills.insert(
            name.to_string(),
            FillValue::Category(fill.unwrap_or_else(|| "missing".to_string())),
        );
    }

    pub fn is_fitted(&self, name: &str) -> bool {
        self.fills.contains_key(name)
    }

    pub fn fill_value(&self, name: &str) -> Option<&FillValue> {
        self.fills.get(name)
    }

    /// Replace missing numeric entries in place
    pub fn transform_numeric(&self, name: &str, values: &mut [Option<f64>]) -> Result<()> {
        if values.iter().all(Option::is_some) {
            return Ok(());
        }
        match self.fills.get(name) {
            Some(FillValue::Number(fill)) => {
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(*fill);
                }
                Ok(())
            }
            _ => Err(AutoMlError::PreprocessingError(format!(
                "Missing values in numeric column '{}' without a fitted imputer",
                name
            ))),
        }
    }

    /// Replace missing categorical entries in place
    pub fn transform_categorical(&self, name: &str, values: &mut [Option<String>]) -> Result<()> {
        if values.iter().all(Option::is_some) {
            return Ok(());
        }
        match self.fills.get(name) {
            Some(FillValue::Category(fill)) => {
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(fill.clone());
                }
                Ok(())
            }
            _ => Err(AutoMlError::PreprocessingError(format!(
                "Missing values in categorical column '{}' without a fitted imputer",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_imputation_uses_fit_rows_only() {
        let values = vec![Some(1.0), None, Some(3.0), Some(100.0)];
        let mut imputer = Imputer::new();
        imputer.fit_numeric("x", &values, &[0, 1, 2], ImputeStrategy::Mean);

        let mut data = values.clone();
        imputer.transform_numeric("x", &mut data).unwrap();
        assert_eq!(data[1], Some(2.0));
        assert_eq!(data[3], Some(100.0));
    }

    #[test]
    fn test_mode_imputation() {
        let values = vec![Some("a".to_string()), Some("b".to_string()), Some("b".to_string()), None];
        let mut imputer = Imputer::new();
        imputer.fit_categorical("c", &values, &[0, 1, 2, 3]);

        let mut data = values.clone();
        imputer.transform_categorical("c", &mut data).unwrap();
        assert_eq!(data[3].as_deref(), Some("b"));
    }

    #[test]
    fn test_unfitted_column_with_missing_values() {
        let imputer = Imputer::new();
        let mut data = vec![Some(1.0), None];
        assert!(imputer.transform_numeric("x", &mut data).is_err());

        let mut complete = vec![Some(1.0)];
        assert!(imputer.transform_numeric("x", &mut complete).is_ok());
    }
}
