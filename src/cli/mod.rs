//! AutoML CLI Module
//!
//! Command-line interface over a [`Session`]: data inspection, bias and EDA
//! reports, training, comparison, tuning and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::session::{ModelArtifact, Predictions, Session, SessionConfig};
use crate::training::{FeatureImportance, ModelType};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn warn_line(msg: &str) {
    println!("  {} {}", "!".yellow().bold(), msg.yellow());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoML for tabular data: detect, preprocess, train, compare and tune")]
#[command(long_about = None)]
pub struct Cli {
    /// Session configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Random seed, overrides the configuration file
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show data information
    Info {
        /// Input data file (CSV, TSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Bias scan and exploratory analysis of a target
    Analyze {
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Also compute a learning curve for this model
        #[arg(long)]
        learning_curve: Option<String>,

        /// Points on the learning curve
        #[arg(long, default_value = "10")]
        points: usize,
    },

    /// Train one or more models
    Train {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        target: String,

        /// Model identifiers, comma separated (rf, gb, et, ada, bag, lr, lasso, ridge, svm, dt, knn)
        #[arg(short, long, value_delimiter = ',', default_value = "rf")]
        models: Vec<String>,

        /// Hyperparameter overrides as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Fraction of rows held out for testing
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Skip SMOTE oversampling
        #[arg(long)]
        no_imbalance: bool,

        /// Save the last trained model to this path
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Train several models and compare them
    Compare {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        target: String,

        /// Model identifiers, comma separated; all compatible models when omitted
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Search hyperparameters with cross-validation
    Tune {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        target: String,

        /// Model to tune (rf, gb, svm)
        #[arg(short, long, default_value = "rf")]
        model: String,

        #[arg(long, default_value = "100")]
        trials: usize,

        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Fold strategy (kfold, stratified, timeseries)
        #[arg(long, default_value = "kfold")]
        strategy: String,
    },

    /// Make predictions using a saved model
    Predict {
        /// Saved model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Session configuration from `--config` and `--seed`
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        Ok(config)
    }
}

// ─── Session setup ─────────────────────────────────────────────────────────────

fn open_session(config: SessionConfig, data_path: &Path, target: &str) -> anyhow::Result<Session> {
    step_run("Loading data");
    let start = Instant::now();
    let dataset = DataLoader::new().load_dataset(data_path)?;
    let mut session = Session::new(config);
    let summary = session.load(dataset)?;
    step_done(&format!("{} rows × {} cols in {:.2?}", summary.n_rows, summary.n_cols, start.elapsed()));

    let problem = session.set_target(target)?;
    println!("  {} target {} is a {} problem", ok("✓"), target.cyan(), problem.to_string().bold());
    Ok(session)
}

fn preprocess(session: &mut Session, test_fraction: f64, handle_imbalance: bool) -> anyhow::Result<()> {
    step_run("Preprocessing");
    let start = Instant::now();
    let summary = session.preprocess_with(test_fraction, handle_imbalance)?;
    step_done(&format!(
        "train {:?} test {:?} in {:.2?}",
        summary.shapes.train,
        summary.shapes.test,
        start.elapsed()
    ));
    for step in &summary.steps {
        println!("    {} {}", dim("·"), muted(step));
    }
    if summary.resampled {
        warn_line("training partition was oversampled with SMOTE");
    }
    Ok(())
}

fn print_metrics(metrics: &BTreeMap<String, f64>) {
    for (name, value) in metrics {
        println!("  {:<22} {}", muted(name), format!("{:.4}", value).white().bold());
    }
}

fn print_importances(importances: &[FeatureImportance]) {
    if importances.is_empty() {
        println!("  {}", dim("feature importances not available for this model"));
        return;
    }
    for fi in importances.iter().take(10) {
        let bar = "█".repeat((fi.importance * 30.0).round().clamp(0.0, 30.0) as usize);
        println!("  {:<22} {:>7.4} {}", fi.feature, fi.importance, accent(&bar));
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let dataset = DataLoader::new().load_dataset(data_path)?;
    let summary = dataset.summary();

    kv("File", &data_path.display().to_string());
    kv("Rows", &summary.n_rows.to_string());
    kv("Columns", &summary.n_cols.to_string());
    kv("Missing cells", &dataset.total_missing().to_string());
    println!();

    println!("  {:<20} {:<12} {:>8} {:>8}", muted("Column"), muted("Type"), muted("Missing"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(52)));
    for col in &summary.columns {
        println!(
            "  {:<20} {:<12} {:>8} {:>8}",
            col.name,
            col.semantic_type.to_string().truecolor(140, 140, 140),
            col.missing,
            col.unique
        );
    }

    println!();
    Ok(())
}

pub fn cmd_analyze(
    config: SessionConfig,
    data_path: &Path,
    target: &str,
    learning_curve: Option<&str>,
    points: usize,
) -> anyhow::Result<()> {
    section("Analyze");
    let mut session = open_session(config, data_path, target)?;

    let bias = session.analyze_bias()?;
    section("Class balance");
    match (&bias.class_counts, bias.imbalance_ratio) {
        (Some(counts), Some(ratio)) => {
            for (label, count) in counts {
                let share = bias
                    .class_distribution
                    .as_ref()
                    .and_then(|d| d.get(label))
                    .copied()
                    .unwrap_or(0.0);
                println!("  {:<22} {:>6} {:>7.1}%", label, count, share * 100.0);
            }
            kv("Imbalance ratio", &format!("{:.2}", ratio));
            if bias.needs_smote == Some(true) {
                warn_line("classes are imbalanced, SMOTE recommended");
            }
        }
        _ => println!("  {}", dim("regression target, no class distribution")),
    }

    section("Numeric features");
    println!("  {:<20} {:>10} {:>10} {:>10} {:>8}", muted("Feature"), muted("Mean"), muted("Std"), muted("Skew"), muted("Scale"));
    for (name, stats) in &bias.feature_statistics {
        let flag = if stats.needs_scaling { "yes".yellow() } else { "no".normal() };
        println!("  {:<20} {:>10.3} {:>10.3} {:>10.3} {:>8}", name, stats.mean, stats.std, stats.skewness, flag);
    }

    let eda = session.perform_eda()?;
    section("Recommendations");
    let join = |v: &[String]| if v.is_empty() { "-".to_string() } else { v.join(", ") };
    kv("Encoding", &join(&eda.recommendations.encoding));
    kv("Scaling", &join(&eda.recommendations.scaling));
    kv("Imputation", &join(&eda.recommendations.imputation));
    kv("Feature selection", if eda.recommendations.feature_selection { "yes" } else { "no" });

    if let Some(model) = learning_curve {
        let test_fraction = session.config().test_fraction;
        let handle_imbalance = session.config().handle_imbalance;
        preprocess(&mut session, test_fraction, handle_imbalance)?;

        step_run(&format!("Learning curve for {}", model.cyan()));
        let curve = session.learning_curve(model, points)?;
        step_done(&format!("{} points", curve.points.len()));

        section(&format!("Learning curve ({})", curve.metric));
        println!("  {:>8} {:>16} {:>16}", muted("Rows"), muted("Train"), muted("Validation"));
        for p in &curve.points {
            println!(
                "  {:>8} {:>9.4} ±{:.3} {:>9.4} ±{:.3}",
                p.train_size, p.train_score_mean, p.train_score_std, p.validation_score_mean, p.validation_score_std
            );
        }
    }

    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config: SessionConfig,
    data_path: &Path,
    target: &str,
    models: &[String],
    params: Option<&str>,
    test_fraction: Option<f64>,
    no_imbalance: bool,
    save: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let overrides: Option<Value> = params.map(serde_json::from_str::<Value>).transpose()?;
    let test_fraction = test_fraction.unwrap_or(config.test_fraction);
    let handle_imbalance = config.handle_imbalance && !no_imbalance;

    let mut session = open_session(config, data_path, target)?;
    preprocess(&mut session, test_fraction, handle_imbalance)?;

    for model in models {
        step_run(&format!("Training {}", model.cyan()));
        let report = session.train(model, overrides.as_ref())?;
        step_done(&format!("{:.3}s", report.training_time_secs));

        section(&report.model_name);
        print_metrics(&report.metrics);
        println!();
        print_importances(&report.feature_importances);
    }

    if let Some(path) = save {
        step_run(&format!("Saving → {}", path.display()));
        let artifact = session.save_model(path, None)?;
        step_done(&artifact.model_name);
    }

    println!();
    Ok(())
}

pub fn cmd_compare(
    config: SessionConfig,
    data_path: &Path,
    target: &str,
    models: &[String],
) -> anyhow::Result<()> {
    section("Compare");

    let test_fraction = config.test_fraction;
    let handle_imbalance = config.handle_imbalance;
    let mut session = open_session(config, data_path, target)?;
    preprocess(&mut session, test_fraction, handle_imbalance)?;

    let problem = session
        .problem_type()
        .ok_or_else(|| anyhow::anyhow!("target not set"))?;
    let candidates: Vec<String> = if models.is_empty() {
        ModelType::all()
            .iter()
            .filter(|mt| mt.check_compatible(problem).is_ok())
            .map(|mt| mt.alias().to_string())
            .collect()
    } else {
        models.to_vec()
    };

    for model in &candidates {
        step_run(&format!("Training {}", model.cyan()));
        match session.train(model, None) {
            Ok(report) => step_done(&format!("{:.3}s", report.training_time_secs)),
            Err(e) => println!("{}", format!("err: {}", e).red()),
        }
    }

    let table = session.compare_models(None)?;
    let primary = table
        .common_metrics
        .first()
        .cloned()
        .unwrap_or_else(|| "accuracy".to_string());

    section("Comparison");
    print!("  {:<26}", muted("Model"));
    for metric in &table.common_metrics {
        print!(" {:>10}", muted(metric));
    }
    println!(" {:>9}", muted("Time"));
    println!("  {}", dim(&"─".repeat(26 + 11 * table.common_metrics.len() + 10)));
    for (name, _) in table.ranking(&primary) {
        if let Some(model) = table.models.iter().find(|m| m.model_name == name) {
            print!("  {:<26}", model.model_name);
            for metric in &table.common_metrics {
                print!(" {:>10.4}", model.metrics.get(metric).copied().unwrap_or(f64::NAN));
            }
            println!(" {:>8.3}s", model.training_time_secs);
        }
    }

    if let Some((name, score)) = table.best(&primary) {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), name.white().bold(), muted(&format!("{}:", primary)), score);
    }

    println!();
    Ok(())
}

pub fn cmd_tune(
    config: SessionConfig,
    data_path: &Path,
    target: &str,
    model: &str,
    trials: usize,
    cv_folds: usize,
    strategy: &str,
) -> anyhow::Result<()> {
    section("Tune");

    let test_fraction = config.test_fraction;
    let handle_imbalance = config.handle_imbalance;
    let mut session = open_session(config, data_path, target)?;
    preprocess(&mut session, test_fraction, handle_imbalance)?;

    step_run(&format!("Searching {} over {} trials ({} folds, {})", model.cyan(), trials, cv_folds, strategy));
    let result = session.tune_hyperparameters(model, trials, cv_folds, strategy)?;
    step_done(&format!("{:.2}s", result.duration_secs));

    section("Best parameters");
    for (name, value) in &result.best_params {
        kv(name, &value.to_string());
    }
    println!();
    kv("CV mean squared error", &format!("{:.4}", result.best_score));
    kv("Trials completed", &result.n_completed.to_string());
    if result.n_failed > 0 {
        warn_line(&format!("{} trials failed and were scored as worst", result.n_failed));
    }

    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = ModelArtifact::load(model_path)?;
    step_done(&format!("{} ({})", artifact.model_name, artifact.problem_type));

    step_run("Loading data");
    let dataset = DataLoader::new().load_dataset(data_path)?;
    step_done(&format!("{} rows", dataset.n_rows()));

    let start = Instant::now();
    let predictions = artifact.predict(&dataset)?;
    println!("  {} {} predictions in {:.2?}", ok("✓"), predictions.len(), start.elapsed());

    match output {
        Some(path) => {
            let mut df = match &predictions {
                Predictions::Labels(labels) => df!("prediction" => labels.clone())?,
                Predictions::Values(values) => df!("prediction" => values.clone())?,
            };
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut df)?;
            println!("  {} written to {}", ok("✓"), path.display());
        }
        None => {
            for (i, p) in predictions.to_strings().iter().take(20).enumerate() {
                println!("  {:>6} {}", dim(&i.to_string()), p);
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 20)));
            }
        }
    }

    println!();
    Ok(())
}
