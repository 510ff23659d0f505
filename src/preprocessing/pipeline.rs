//! Preprocessing pipeline: fitted plan, split and audit summary

use super::{
    config::PreprocessingConfig,
    encoder::LabelEncoder,
    imputer::{ImputeStrategy, Imputer},
    scaler::StandardScaler,
    split::train_test_split,
};
use crate::autopipeline::{ProblemType, TargetSpec};
use crate::data::{format_number, ColumnData, Dataset, SemanticType};
use crate::error::{AutoMlError, Result};
use crate::synthetic::{Sampler, SMOTE};
use chrono::Datelike;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Train/test partitions of the feature matrix and target
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl Split {
    pub fn train_shape(&self) -> (usize, usize) {
        self.x_train.dim()
    }

    pub fn test_shape(&self) -> (usize, usize) {
        self.x_test.dim()
    }
}

/// Shapes recorded during preprocessing as `(rows, cols)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataShapes {
    pub original: (usize, usize),
    pub train: (usize, usize),
    pub test: (usize, usize),
}

/// Audit summary returned by preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSummary {
    pub steps: Vec<String>,
    pub shapes: DataShapes,
    pub feature_names: Vec<String>,
    pub initial_features: Vec<String>,
    /// Whether synthetic minority samples were added to the training rows
    pub resampled: bool,
    /// Training class counts after any resampling (classification only)
    pub target_distribution: Option<BTreeMap<String, usize>>,
}

/// Everything produced by [`Preprocessor::fit_transform`]
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub split: Split,
    pub plan: PreprocessingPlan,
    pub summary: PreprocessSummary,
}

/// How an input feature contributes to the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureKind {
    Numeric,
    DatePart,
    Categorical,
}

/// A feature column on its way into the matrix
#[derive(Debug, Clone)]
enum WorkingValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

#[derive(Debug, Clone)]
struct WorkingColumn {
    name: String,
    kind: FeatureKind,
    values: WorkingValues,
}

/// Fitted, reusable transform from raw dataset columns to model features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingPlan {
    target: String,
    problem_type: ProblemType,
    initial_features: Vec<(String, SemanticType)>,
    feature_names: Vec<String>,
    imputer: Option<Imputer>,
    encoders: BTreeMap<String, LabelEncoder>,
    scaler: Option<StandardScaler>,
    target_encoder: Option<LabelEncoder>,
    steps: Vec<String>,
}

impl PreprocessingPlan {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Ordered, human-readable record of the fitted steps
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Class labels in code order (classification only)
    pub fn class_labels(&self) -> Option<&[String]> {
        self.target_encoder.as_ref().map(LabelEncoder::classes)
    }

    /// Label for a predicted class code
    pub fn decode_class(&self, code: f64) -> Option<String> {
        let encoder = self.target_encoder.as_ref()?;
        if code < 0.0 {
            return None;
        }
        encoder.decode(code.round() as usize).map(str::to_string)
    }

    /// Rebuild lookup tables after deserialization
    pub(crate) fn restore(&mut self) {
        for encoder in self.encoders.values_mut() {
            encoder.rebuild_index();
        }
        if let Some(encoder) = self.target_encoder.as_mut() {
            encoder.rebuild_index();
        }
    }

    /// Apply the fitted plan to new rows. The target column is ignored if
    /// present; unseen categories are an error.
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let mut columns = Vec::with_capacity(self.initial_features.len());
        for (name, semantic) in &self.initial_features {
            let column = dataset.column(name)?;
            columns.push((name.as_str(), coerce(name, column, *semantic)?));
        }

        let mut working = expand_datetimes(columns).0;
        let n_rows = dataset.n_rows();

        for col in working.iter_mut() {
            match &mut col.values {
                WorkingValues::Numeric(values) => match &self.imputer {
                    Some(imputer) if imputer.is_fitted(&col.name) => {
                        imputer.transform_numeric(&col.name, values)?
                    }
                    _ => ensure_complete(&col.name, values.iter().all(Option::is_some))?,
                },
                WorkingValues::Categorical(values) => match &self.imputer {
                    Some(imputer) if imputer.is_fitted(&col.name) => {
                        imputer.transform_categorical(&col.name, values)?
                    }
                    _ => ensure_complete(&col.name, values.iter().all(Option::is_some))?,
                },
            }
        }

        let mut x = build_matrix(&working, &self.encoders, n_rows)?;
        if let Some(scaler) = &self.scaler {
            scaler.transform_inplace(&mut x)?;
        }
        Ok(x)
    }
}

fn ensure_complete(name: &str, complete: bool) -> Result<()> {
    if complete {
        Ok(())
    } else {
        Err(AutoMlError::PreprocessingError(format!(
            "Column '{}' has missing values but no imputation was fitted",
            name
        )))
    }
}

/// Read a column as the semantic type the plan was fitted with
fn coerce(name: &str, column: &ColumnData, expected: SemanticType) -> Result<ColumnData> {
    match (expected, column) {
        (SemanticType::Numeric, ColumnData::Numeric(_))
        | (SemanticType::Categorical, ColumnData::Categorical(_))
        | (SemanticType::DateTime, ColumnData::DateTime(_)) => Ok(column.clone()),
        (SemanticType::Categorical, other) => Ok(ColumnData::Categorical(
            (0..other.len()).map(|i| other.value_label(i)).collect(),
        )),
        (expected, other) => Err(AutoMlError::DataError(format!(
            "Column '{}' is {} but the model expects {}",
            name,
            other.semantic_type(),
            expected
        ))),
    }
}

/// Replace every datetime column by year/month/day parts, in place
fn expand_datetimes(columns: Vec<(&str, ColumnData)>) -> (Vec<WorkingColumn>, Vec<String>) {
    let mut working = Vec::with_capacity(columns.len());
    let mut expanded = Vec::new();

    for (name, data) in columns {
        match data {
            ColumnData::Numeric(values) => working.push(WorkingColumn {
                name: name.to_string(),
                kind: FeatureKind::Numeric,
                values: WorkingValues::Numeric(values),
            }),
            ColumnData::Categorical(values) => working.push(WorkingColumn {
                name: name.to_string(),
                kind: FeatureKind::Categorical,
                values: WorkingValues::Categorical(values),
            }),
            ColumnData::DateTime(values) => {
                let parts: [(&str, fn(&chrono::NaiveDate) -> f64); 3] = [
                    ("year", |d: &chrono::NaiveDate| d.year() as f64),
                    ("month", |d: &chrono::NaiveDate| d.month() as f64),
                    ("day", |d: &chrono::NaiveDate| d.day() as f64),
                ];
                for (suffix, extract) in parts {
                    working.push(WorkingColumn {
                        name: format!("{}_{}", name, suffix),
                        kind: FeatureKind::DatePart,
                        values: WorkingValues::Numeric(
                            values.iter().map(|v| v.as_ref().map(extract)).collect(),
                        ),
                    });
                }
                expanded.push(name.to_string());
            }
        }
    }
    (working, expanded)
}

fn build_matrix(
    working: &[WorkingColumn],
    encoders: &BTreeMap<String, LabelEncoder>,
    n_rows: usize,
) -> Result<Array2<f64>> {
    let mut x = Array2::zeros((n_rows, working.len()));
    for (j, col) in working.iter().enumerate() {
        let mut target = x.column_mut(j);
        match &col.values {
            WorkingValues::Numeric(values) => {
                for (i, v) in values.iter().enumerate() {
                    target[i] = v.unwrap_or(f64::NAN);
                }
            }
            WorkingValues::Categorical(values) => {
                let encoder = encoders.get(&col.name).ok_or_else(|| {
                    AutoMlError::PreprocessingError(format!(
                        "No encoder fitted for column '{}'",
                        col.name
                    ))
                })?;
                for (i, v) in values.iter().enumerate() {
                    let value = v.as_deref().ok_or_else(|| {
                        AutoMlError::PreprocessingError(format!(
                            "Missing value in categorical column '{}'",
                            col.name
                        ))
                    })?;
                    target[i] = encoder.encode(value)? as f64;
                }
            }
        }
    }
    Ok(x)
}

/// Preprocessing engine
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessingConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Fit the plan on `dataset` and produce the train/test split
    pub fn fit_transform(&self, dataset: &Dataset, target: &TargetSpec) -> Result<PreprocessOutput> {
        let start = Instant::now();
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(AutoMlError::EmptyDataset);
        }

        let original = (dataset.n_rows(), dataset.n_cols());
        info!(rows = original.0, cols = original.1, target = %target.column, "preprocessing started");
        let mut steps = Vec::new();

        // Rows with a missing target cannot be learned from
        let target_col = dataset.column(&target.column)?;
        let keep: Vec<usize> = (0..dataset.n_rows())
            .filter(|&i| target_col.value_label(i).is_some())
            .collect();
        if keep.is_empty() {
            return Err(AutoMlError::EmptyDataset);
        }
        if keep.len() < dataset.n_rows() {
            steps.push(format!(
                "Dropped {} rows with missing target",
                dataset.n_rows() - keep.len()
            ));
        }

        // 1. Separate features and target
        let (y, target_encoder) = encode_target(target, &target_col.take(&keep))?;
        let features = dataset.without_column(&target.column)?;
        let initial_features: Vec<(String, SemanticType)> = features
            .iter()
            .map(|(name, col)| (name.to_string(), col.semantic_type()))
            .collect();
        let n_rows = keep.len();

        // 2. Datetime decomposition
        let columns: Vec<(&str, ColumnData)> = features
            .iter()
            .map(|(name, col)| (name, col.take(&keep)))
            .collect();
        let (mut working, expanded) = expand_datetimes(columns);
        for name in &expanded {
            steps.push(format!("Extracted year, month, day from {}", name));
        }

        // Split rows up front so statistics can be fitted on training rows
        let strata: Option<Vec<usize>> = target
            .is_classification()
            .then(|| y.iter().map(|&v| v as usize).collect());
        let indices = train_test_split(
            n_rows,
            self.config.test_fraction,
            strata.as_deref(),
            self.config.random_state,
        )?;
        let all_rows: Vec<usize> = (0..n_rows).collect();
        let fit_rows: &[usize] = if self.config.fit_on_train_only {
            &indices.train
        } else {
            &all_rows
        };

        // 3. Imputation
        let has_missing = working.iter().any(|c| match &c.values {
            WorkingValues::Numeric(v) => v.iter().any(Option::is_none),
            WorkingValues::Categorical(v) => v.iter().any(Option::is_none),
        });
        let imputer = if has_missing {
            let mut imputer = Imputer::new();
            let (mut numeric, mut categorical) = (false, false);
            for col in working.iter_mut() {
                match &mut col.values {
                    WorkingValues::Numeric(values) => {
                        imputer.fit_numeric(&col.name, values, fit_rows, ImputeStrategy::Mean);
                        imputer.transform_numeric(&col.name, values)?;
                        numeric = true;
                    }
                    WorkingValues::Categorical(values) => {
                        imputer.fit_categorical(&col.name, values, fit_rows);
                        imputer.transform_categorical(&col.name, values)?;
                        categorical = true;
                    }
                }
            }
            if numeric {
                steps.push("Imputed missing numeric values with mean".to_string());
            }
            if categorical {
                steps.push("Imputed missing categorical values with mode".to_string());
            }
            Some(imputer)
        } else {
            None
        };

        // 4. Label encoding
        let mut encoders = BTreeMap::new();
        for col in &working {
            if let WorkingValues::Categorical(values) = &col.values {
                let encoder = LabelEncoder::fit(&col.name, values.iter().flatten().map(String::as_str));
                encoders.insert(col.name.clone(), encoder);
                steps.push(format!("Encoded categorical column: {}", col.name));
            }
        }

        let feature_names: Vec<String> = working.iter().map(|c| c.name.clone()).collect();
        let mut x = build_matrix(&working, &encoders, n_rows)?;

        // 5. Standardize numeric columns
        let numeric_idx: Vec<usize> = working
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == FeatureKind::Numeric)
            .map(|(j, _)| j)
            .collect();
        let scaler = if numeric_idx.is_empty() {
            None
        } else {
            let scaler = StandardScaler::fit(&x, &numeric_idx, fit_rows)?;
            scaler.transform_inplace(&mut x)?;
            steps.push("Scaled numeric features".to_string());
            Some(scaler)
        };

        // 6. Split
        let mut x_train = x.select(Axis(0), &indices.train);
        let mut y_train: Array1<f64> = indices.train.iter().map(|&i| y[i]).collect();
        let x_test = x.select(Axis(0), &indices.test);
        let y_test: Array1<f64> = indices.test.iter().map(|&i| y[i]).collect();
        steps.push(format!(
            "Split data into train/test sets (test_size={})",
            self.config.test_fraction
        ));

        // 7. Minority oversampling on the training partition only
        let mut resampled = false;
        if self.config.handle_imbalance && target.is_classification() {
            let labels: Array1<i64> = y_train.iter().map(|&v| v as i64).collect();
            let counts = crate::synthetic::class_counts(&labels);
            let min_count = counts.values().copied().min().unwrap_or(0);
            let threshold = self.config.smote_minority_threshold * y_train.len() as f64;
            if counts.len() >= 2 && (min_count as f64) < threshold {
                let result = SMOTE::new()
                    .with_k_neighbors(self.config.smote_k_neighbors)
                    .with_seed(self.config.random_state)
                    .fit_resample(&x_train, &labels)?;
                debug!(added = result.x.nrows() - x_train.nrows(), "SMOTE applied");
                x_train = result.x;
                y_train = result.y.mapv(|v| v as f64);
                resampled = true;
                steps.push("Applied SMOTE to handle class imbalance".to_string());
            }
        }

        let target_distribution = target_encoder.as_ref().map(|encoder| {
            let mut dist = BTreeMap::new();
            for &v in y_train.iter() {
                if let Some(label) = encoder.decode(v as usize) {
                    *dist.entry(label.to_string()).or_insert(0) += 1;
                }
            }
            dist
        });

        let shapes = DataShapes {
            original,
            train: x_train.dim(),
            test: x_test.dim(),
        };
        info!(
            train = ?shapes.train,
            test = ?shapes.test,
            resampled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "preprocessing finished"
        );

        let plan = PreprocessingPlan {
            target: target.column.clone(),
            problem_type: target.problem_type,
            initial_features: initial_features.clone(),
            feature_names: feature_names.clone(),
            imputer,
            encoders,
            scaler,
            target_encoder,
            steps: steps.clone(),
        };

        let summary = PreprocessSummary {
            steps,
            shapes,
            feature_names: feature_names.clone(),
            initial_features: initial_features.into_iter().map(|(n, _)| n).collect(),
            resampled,
            target_distribution,
        };

        Ok(PreprocessOutput {
            split: Split {
                x_train,
                y_train,
                x_test,
                y_test,
                feature_names,
            },
            plan,
            summary,
        })
    }
}

/// Encode the target as class codes (classification) or raw values
fn encode_target(target: &TargetSpec, column: &ColumnData) -> Result<(Vec<f64>, Option<LabelEncoder>)> {
    match (target.problem_type, column) {
        (ProblemType::Regression, ColumnData::Numeric(values)) => {
            Ok((values.iter().flatten().copied().collect(), None))
        }
        (ProblemType::Regression, other) => Err(AutoMlError::DataError(format!(
            "Regression target '{}' must be numeric, found {}",
            target.column,
            other.semantic_type()
        ))),
        (ProblemType::Classification, ColumnData::Numeric(values)) => {
            let mut distinct: Vec<f64> = values.iter().flatten().copied().collect();
            distinct.sort_by(f64::total_cmp);
            distinct.dedup();
            let classes: Vec<String> = distinct.into_iter().map(format_number).collect();
            let encoder = LabelEncoder::from_classes(&target.column, classes);
            let y = values
                .iter()
                .flatten()
                .map(|&v| encoder.encode(&format_number(v)).map(|c| c as f64))
                .collect::<Result<Vec<_>>>()?;
            Ok((y, Some(encoder)))
        }
        (ProblemType::Classification, other) => {
            let labels: Vec<String> = (0..other.len()).filter_map(|i| other.value_label(i)).collect();
            let encoder = LabelEncoder::fit(&target.column, labels.iter().map(String::as_str));
            let y = labels
                .iter()
                .map(|l| encoder.encode(l).map(|c| c as f64))
                .collect::<Result<Vec<_>>>()?;
            Ok((y, Some(encoder)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn churn_dataset(n: usize) -> Dataset {
        let age: Vec<f64> = (0..n).map(|i| 20.0 + (i % 40) as f64).collect();
        let plan: Vec<String> = (0..n)
            .map(|i| if i % 3 == 0 { "basic" } else { "premium" }.to_string())
            .collect();
        let churn: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
        Dataset::new(vec![
            ("age".to_string(), ColumnData::numeric(age)),
            ("plan".to_string(), ColumnData::categorical(plan)),
            ("churn".to_string(), ColumnData::numeric(churn)),
        ])
        .unwrap()
    }

    fn target(name: &str, problem_type: ProblemType) -> TargetSpec {
        TargetSpec {
            column: name.to_string(),
            problem_type,
        }
    }

    #[test]
    fn test_split_shapes_and_steps() {
        let ds = churn_dataset(100);
        let out = Preprocessor::default()
            .fit_transform(&ds, &target("churn", ProblemType::Classification))
            .unwrap();

        assert_eq!(out.summary.shapes.original, (100, 3));
        assert_eq!(out.summary.shapes.train, (80, 2));
        assert_eq!(out.summary.shapes.test, (20, 2));
        assert_eq!(out.summary.feature_names, vec!["age", "plan"]);
        assert!(!out.summary.resampled);
        assert_eq!(
            out.summary.steps,
            vec![
                "Encoded categorical column: plan",
                "Scaled numeric features",
                "Split data into train/test sets (test_size=0.2)",
            ]
        );
        let dist = out.summary.target_distribution.unwrap();
        assert_eq!(dist["0"] + dist["1"], 80);
    }

    #[test]
    fn test_datetime_expanded() {
        let dates: Vec<Option<NaiveDate>> = (0..20)
            .map(|i| NaiveDate::from_ymd_opt(2020, 1 + (i % 12) as u32, 1 + i as u32))
            .collect();
        let ds = Dataset::new(vec![
            ("signup".to_string(), ColumnData::DateTime(dates)),
            ("y".to_string(), ColumnData::numeric((0..20).map(|i| i as f64 * 1.5))),
        ])
        .unwrap();

        let out = Preprocessor::default()
            .fit_transform(&ds, &target("y", ProblemType::Regression))
            .unwrap();
        assert_eq!(out.split.feature_names, vec!["signup_year", "signup_month", "signup_day"]);
        assert_eq!(out.summary.steps[0], "Extracted year, month, day from signup");
        assert!(out.summary.target_distribution.is_none());
        assert!(out.split.x_train.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_imputation_fills_all_missing() {
        let ds = Dataset::new(vec![
            (
                "x".to_string(),
                ColumnData::Numeric((0..30).map(|i| if i % 7 == 0 { None } else { Some(i as f64) }).collect()),
            ),
            (
                "c".to_string(),
                ColumnData::Categorical(
                    (0..30).map(|i| if i % 5 == 0 { None } else { Some(format!("k{}", i % 3)) }).collect(),
                ),
            ),
            ("y".to_string(), ColumnData::numeric((0..30).map(|i| i as f64 * 0.5))),
        ])
        .unwrap();

        let out = Preprocessor::default()
            .fit_transform(&ds, &target("y", ProblemType::Regression))
            .unwrap();
        assert!(out.summary.steps.contains(&"Imputed missing numeric values with mean".to_string()));
        assert!(out.summary.steps.contains(&"Imputed missing categorical values with mode".to_string()));
        assert!(out.split.x_train.iter().chain(out.split.x_test.iter()).all(|v| v.is_finite()));
    }

    #[test]
    fn test_smote_only_touches_training_rows() {
        let n = 100;
        let ds = Dataset::new(vec![
            ("f".to_string(), ColumnData::numeric((0..n).map(|i| i as f64))),
            ("y".to_string(), ColumnData::numeric((0..n).map(|i| if i < 10 { 1.0 } else { 0.0 }))),
        ])
        .unwrap();

        let out = Preprocessor::default()
            .fit_transform(&ds, &target("y", ProblemType::Classification))
            .unwrap();
        assert!(out.summary.resampled);
        assert_eq!(out.summary.shapes.test.0, 20);
        let dist = out.summary.target_distribution.unwrap();
        assert_eq!(dist["0"], dist["1"]);

        let without = Preprocessor::new(PreprocessingConfig::default().with_handle_imbalance(false))
            .fit_transform(&ds, &target("y", ProblemType::Classification))
            .unwrap();
        assert!(!without.summary.resampled);
        assert_eq!(without.summary.shapes.train.0, 80);
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::new(vec![("y".to_string(), ColumnData::numeric(Vec::<f64>::new()))]).unwrap();
        let result = Preprocessor::default().fit_transform(&ds, &target("y", ProblemType::Regression));
        assert!(matches!(result, Err(AutoMlError::EmptyDataset)));
    }

    #[test]
    fn test_plan_transform_and_unseen_category() {
        let ds = churn_dataset(50);
        let out = Preprocessor::default()
            .fit_transform(&ds, &target("churn", ProblemType::Classification))
            .unwrap();

        let fresh = Dataset::new(vec![
            ("age".to_string(), ColumnData::numeric(vec![30.0, 41.0])),
            ("plan".to_string(), ColumnData::categorical(vec!["basic", "premium"])),
        ])
        .unwrap();
        let x = out.plan.transform(&fresh).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 1]], 1.0);

        let unseen = Dataset::new(vec![
            ("age".to_string(), ColumnData::numeric(vec![30.0])),
            ("plan".to_string(), ColumnData::categorical(vec!["enterprise"])),
        ])
        .unwrap();
        assert!(matches!(
            out.plan.transform(&unseen),
            Err(AutoMlError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn test_repeatable() {
        let ds = churn_dataset(60);
        let t = target("churn", ProblemType::Classification);
        let a = Preprocessor::default().fit_transform(&ds, &t).unwrap();
        let b = Preprocessor::default().fit_transform(&ds, &t).unwrap();
        assert_eq!(a.split.x_train, b.split.x_train);
        assert_eq!(a.split.y_test, b.split.y_test);
    }
}
