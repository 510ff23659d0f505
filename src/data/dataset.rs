//! Typed column storage and polars conversion

use crate::error::{AutoMlError, Result};
use chrono::{DateTime, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Semantic type of a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Categorical,
    DateTime,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticType::Numeric => write!(f, "numeric"),
            SemanticType::Categorical => write!(f, "categorical"),
            SemanticType::DateTime => write!(f, "datetime"),
        }
    }
}

/// Column values. `None` marks a missing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    /// Build a numeric column without missing values
    pub fn numeric(values: impl IntoIterator<Item = f64>) -> Self {
        ColumnData::Numeric(
            values
                .into_iter()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        )
    }

    /// Build a categorical column without missing values
    pub fn categorical<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        ColumnData::Categorical(values.into_iter().map(|v| Some(v.into())).collect())
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            ColumnData::Numeric(_) => SemanticType::Numeric,
            ColumnData::Categorical(_) => SemanticType::Categorical,
            ColumnData::DateTime(_) => SemanticType::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing entries
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::DateTime(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Number of distinct non-missing values
    pub fn n_unique(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v
                .iter()
                .flatten()
                .map(|x| x.to_bits())
                .collect::<HashSet<_>>()
                .len(),
            ColumnData::Categorical(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
            ColumnData::DateTime(v) => v.iter().flatten().collect::<HashSet<_>>().len(),
        }
    }

    /// Observed numeric values, skipping missing entries
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Numeric(v) => Some(v.iter().flatten().copied().collect()),
            _ => None,
        }
    }

    /// Stringified value at `idx`, used for labels and category lookups
    pub fn value_label(&self, idx: usize) -> Option<String> {
        match self {
            ColumnData::Numeric(v) => v.get(idx).copied().flatten().map(format_number),
            ColumnData::Categorical(v) => v.get(idx).cloned().flatten(),
            ColumnData::DateTime(v) => v.get(idx).copied().flatten().map(|d| d.to_string()),
        }
    }

    /// Rows at the given indices, in order
    pub fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::DateTime(v) => ColumnData::DateTime(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Render a number the way it reads in a table: integral values without a
/// trailing `.0`
pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Per-column overview returned when a dataset is loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub semantic_type: SemanticType,
    pub missing: usize,
    pub unique: usize,
}

/// Dataset overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

/// Ordered table of named, typed columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from named columns. All columns must have the same
    /// length and names must be unique.
    pub fn new(columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if column.len() != n_rows {
                return Err(AutoMlError::ShapeError {
                    expected: format!("{} rows in column '{}'", n_rows, name),
                    actual: column.len().to_string(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(AutoMlError::DataError(format!("Duplicate column name '{}'", name)));
            }
            names.push(name);
            data.push(column);
        }

        Ok(Self { names, columns: data, n_rows })
    }

    /// Convert a polars frame into typed columns.
    ///
    /// Integer, float and boolean columns become numeric, `Date` and
    /// `Datetime` columns become datetime, everything else is read as strings
    /// and treated as categorical.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let data = match series.dtype() {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
                DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
                DataType::Float32 | DataType::Float64 | DataType::Boolean => {
                    let casted = series.cast(&DataType::Float64)?;
                    let values = casted
                        .f64()?
                        .into_iter()
                        .map(|v| v.filter(|x| !x.is_nan()))
                        .collect();
                    ColumnData::Numeric(values)
                }
                DataType::Date => {
                    let casted = series.cast(&DataType::Int32)?;
                    let values = casted
                        .i32()?
                        .into_iter()
                        .map(|v| {
                            v.and_then(|days| {
                                NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
                            })
                        })
                        .collect();
                    ColumnData::DateTime(values)
                }
                DataType::Datetime(unit, _) => {
                    let per_second: i64 = match unit {
                        TimeUnit::Milliseconds => 1_000,
                        TimeUnit::Microseconds => 1_000_000,
                        TimeUnit::Nanoseconds => 1_000_000_000,
                    };
                    let casted = series.cast(&DataType::Int64)?;
                    let values = casted
                        .i64()?
                        .into_iter()
                        .map(|v| v.and_then(|ts| timestamp_to_date(ts, per_second)))
                        .collect();
                    ColumnData::DateTime(values)
                }
                _ => {
                    let casted = series.cast(&DataType::String)?;
                    let values = casted
                        .str()?
                        .into_iter()
                        .map(|v| v.map(|s| s.to_string()))
                        .collect();
                    ColumnData::Categorical(values)
                }
            };
            columns.push((column.name().to_string(), data));
        }
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| AutoMlError::ColumnNotFound(name.to_string()))
    }

    /// Iterate `(name, column)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Copy of the dataset without the named column
    pub fn without_column(&self, name: &str) -> Result<Dataset> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| AutoMlError::ColumnNotFound(name.to_string()))?;
        let mut names = self.names.clone();
        let mut columns = self.columns.clone();
        names.remove(idx);
        columns.remove(idx);
        Ok(Dataset { names, columns, n_rows: self.n_rows })
    }

    /// Total number of missing cells
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(ColumnData::null_count).sum()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            n_rows: self.n_rows,
            n_cols: self.columns.len(),
            columns: self
                .iter()
                .map(|(name, col)| ColumnSummary {
                    name: name.to_string(),
                    semantic_type: col.semantic_type(),
                    missing: col.null_count(),
                    unique: col.n_unique(),
                })
                .collect(),
        }
    }
}

fn timestamp_to_date(ts: i64, per_second: i64) -> Option<NaiveDate> {
    let secs = ts.div_euclid(per_second);
    let nanos = ts.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_new_checks_lengths() {
        let result = Dataset::new(vec![
            ("a".to_string(), ColumnData::numeric(vec![1.0, 2.0])),
            ("b".to_string(), ColumnData::numeric(vec![1.0])),
        ]);
        assert!(matches!(result, Err(AutoMlError::ShapeError { .. })));
    }

    #[test]
    fn test_dataset_duplicate_names() {
        let result = Dataset::new(vec![
            ("a".to_string(), ColumnData::numeric(vec![1.0])),
            ("a".to_string(), ColumnData::numeric(vec![2.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_dataframe_types() {
        let df = df!(
            "age" => &[25i64, 32, 47],
            "income" => &[Some(40_000.0), None, Some(55_500.5)],
            "city" => &["Paris", "Lyon", "Paris"],
            "member" => &[true, false, true]
        )
        .unwrap();

        let ds = Dataset::from_dataframe(&df).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column("age").unwrap().semantic_type(), SemanticType::Numeric);
        assert_eq!(ds.column("city").unwrap().semantic_type(), SemanticType::Categorical);
        assert_eq!(ds.column("member").unwrap().semantic_type(), SemanticType::Numeric);
        assert_eq!(ds.column("income").unwrap().null_count(), 1);
        assert_eq!(ds.column("city").unwrap().n_unique(), 2);
    }

    #[test]
    fn test_from_dataframe_dates() {
        let dates = Column::new("day".into(), &[0i32, 365, 19_000])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![dates]).unwrap();

        let ds = Dataset::from_dataframe(&df).unwrap();
        match ds.column("day").unwrap() {
            ColumnData::DateTime(values) => {
                assert_eq!(values[0], NaiveDate::from_ymd_opt(1970, 1, 1));
                assert_eq!(values[1], NaiveDate::from_ymd_opt(1971, 1, 1));
            }
            other => panic!("expected datetime column, got {:?}", other.semantic_type()),
        }
    }

    #[test]
    fn test_column_not_found() {
        let ds = Dataset::new(vec![("a".to_string(), ColumnData::numeric(vec![1.0]))]).unwrap();
        assert!(matches!(ds.column("b"), Err(AutoMlError::ColumnNotFound(_))));
        assert!(matches!(ds.without_column("b"), Err(AutoMlError::ColumnNotFound(_))));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
    }
}
