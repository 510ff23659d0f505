use automl_core::autopipeline::{ProblemType, TargetSpec};
use automl_core::data::Dataset;
use automl_core::preprocessing::{PreprocessingConfig, Preprocessor, Split};
use automl_core::training::{ModelParams, ModelType, Trainer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target is the sum of features plus noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(format!("feature_{}", i).into(), values).into())
        .collect();
    columns.push(Series::new("target".into(), target).into());

    DataFrame::new(columns).unwrap()
}

fn prepared_split(n_rows: usize) -> Split {
    let dataset = Dataset::from_dataframe(&create_regression_data(n_rows, 10)).unwrap();
    let target = TargetSpec {
        column: "target".to_string(),
        problem_type: ProblemType::Regression,
    };
    Preprocessor::new(PreprocessingConfig::default())
        .fit_transform(&dataset, &target)
        .unwrap()
        .split
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    for n_rows in [1000, 5000].iter() {
        let dataset = Dataset::from_dataframe(&create_regression_data(*n_rows, 10)).unwrap();
        let target = TargetSpec {
            column: "target".to_string(),
            problem_type: ProblemType::Regression,
        };
        group.bench_with_input(BenchmarkId::new("fit_transform", n_rows), &dataset, |b, ds| {
            b.iter(|| {
                Preprocessor::default()
                    .fit_transform(black_box(ds), &target)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let split = prepared_split(2000);
    for model_type in [
        ModelType::Linear,
        ModelType::DecisionTree,
        ModelType::RandomForest,
        ModelType::GradientBoosting,
        ModelType::Knn,
    ] {
        group.bench_with_input(
            BenchmarkId::new("fit", model_type.alias()),
            &split,
            |b, split| {
                b.iter(|| {
                    Trainer::new(ProblemType::Regression)
                        .train(model_type, ModelParams::defaults(model_type), black_box(split))
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let split = prepared_split(5000);
    let record = Trainer::new(ProblemType::Regression)
        .train(ModelType::RandomForest, ModelParams::defaults(ModelType::RandomForest), &split)
        .unwrap();

    group.bench_function("random_forest", |b| {
        b.iter(|| record.estimator.predict(black_box(&split.x_test)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_preprocessing, bench_training, bench_prediction);
criterion_main!(benches);
