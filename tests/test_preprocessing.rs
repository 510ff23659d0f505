//! Integration test: loading and preprocessing end-to-end

use automl_core::autopipeline::{ProblemType, ProblemTypeDetector};
use automl_core::data::{Dataset, SemanticType};
use automl_core::error::AutoMlError;
use automl_core::preprocessing::{PreprocessingConfig, Preprocessor};
use automl_core::utils::DataLoader;
use polars::prelude::*;
use std::io::Write;

fn imbalanced_df() -> DataFrame {
    let n = 100;
    let x1: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
    let x2: Vec<f64> = (0..n).map(|i| (i % 13) as f64 * 2.0 + 100.0).collect();
    // 10% minority
    let label: Vec<i64> = (0..n).map(|i| if i % 10 == 0 { 1 } else { 0 }).collect();
    df!("x1" => x1, "x2" => x2, "label" => label).unwrap()
}

#[test]
fn test_csv_with_dates_and_categories() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "signup,city,visits,spent").unwrap();
    for i in 0..24 {
        writeln!(
            file,
            "2023-{:02}-{:02},{},{},{}",
            1 + i % 12,
            1 + i % 28,
            ["paris", "lyon", "nice"][i % 3],
            i % 9,
            10.25 + i as f64 * 3.5
        )
        .unwrap();
    }
    file.flush().unwrap();

    let dataset = DataLoader::new().load_dataset(file.path()).unwrap();
    assert_eq!(dataset.n_rows(), 24);
    assert_eq!(dataset.column("signup").unwrap().semantic_type(), SemanticType::DateTime);
    assert_eq!(dataset.column("city").unwrap().semantic_type(), SemanticType::Categorical);

    let target = ProblemTypeDetector::new().detect(&dataset, "spent").unwrap();
    assert_eq!(target.problem_type, ProblemType::Regression);

    let out = Preprocessor::default().fit_transform(&dataset, &target).unwrap();
    assert_eq!(
        out.split.feature_names,
        vec!["signup_year", "signup_month", "signup_day", "city", "visits"]
    );
    assert_eq!(out.summary.initial_features, vec!["signup", "city", "visits"]);
    assert_eq!(out.split.train_shape().1, 5);
}

#[test]
fn test_smote_only_touches_training_rows() {
    let dataset = Dataset::from_dataframe(&imbalanced_df()).unwrap();
    let target = ProblemTypeDetector::new().detect(&dataset, "label").unwrap();
    assert!(target.is_classification());

    let out = Preprocessor::default().fit_transform(&dataset, &target).unwrap();
    assert!(out.summary.resampled);
    assert_eq!(out.split.x_test.nrows(), 20);
    // Stratified: two minority rows land in the test partition
    assert_eq!(out.split.y_test.iter().filter(|&&v| v == 1.0).count(), 2);
    assert!(out.split.x_train.nrows() > 80);

    let dist = out.summary.target_distribution.unwrap();
    assert!(dist["1"] > 8);

    let disabled = Preprocessor::new(PreprocessingConfig::default().with_handle_imbalance(false))
        .fit_transform(&dataset, &target)
        .unwrap();
    assert!(!disabled.summary.resampled);
    assert_eq!(disabled.split.x_train.nrows(), 80);
}

#[test]
fn test_scaling_statistics_come_from_training_rows() {
    let dataset = Dataset::from_dataframe(&imbalanced_df()).unwrap();
    let target = ProblemTypeDetector::new().detect(&dataset, "x1").unwrap();
    let out = Preprocessor::default().fit_transform(&dataset, &target).unwrap();

    // Only the numeric feature columns are standardized
    for col in 0..out.split.x_train.ncols() {
        let column = out.split.x_train.column(col);
        let mean = column.sum() / column.len() as f64;
        assert!(mean.abs() < 1e-9, "column {} mean {}", col, mean);
    }
}

#[test]
fn test_plan_rejects_unseen_category() {
    let df = df!(
        "color" => &["red", "blue", "red", "green", "blue", "red", "green", "blue"],
        "size" => &[1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5]
    )
    .unwrap();
    let dataset = Dataset::from_dataframe(&df).unwrap();
    let target = ProblemTypeDetector::new().detect(&dataset, "size").unwrap();
    let out = Preprocessor::default().fit_transform(&dataset, &target).unwrap();

    let seen = Dataset::from_dataframe(&df!("color" => &["green", "red"]).unwrap()).unwrap();
    assert_eq!(out.plan.transform(&seen).unwrap().nrows(), 2);

    let unseen = Dataset::from_dataframe(&df!("color" => &["purple"]).unwrap()).unwrap();
    assert!(matches!(
        out.plan.transform(&unseen),
        Err(AutoMlError::UnseenCategory { .. })
    ));
}

#[test]
fn test_empty_and_invalid_inputs() {
    let empty = Dataset::from_dataframe(&df!("a" => Vec::<f64>::new(), "b" => Vec::<f64>::new()).unwrap()).unwrap();
    assert!(empty.is_empty());

    let dataset = Dataset::from_dataframe(&imbalanced_df()).unwrap();
    let target = ProblemTypeDetector::new().detect(&dataset, "label").unwrap();
    assert!(matches!(
        Preprocessor::default().fit_transform(&empty, &target),
        Err(AutoMlError::EmptyDataset)
    ));
    assert!(matches!(
        Preprocessor::new(PreprocessingConfig::default().with_test_fraction(0.0))
            .fit_transform(&dataset, &target),
        Err(AutoMlError::InvalidParameter { .. })
    ));
}
