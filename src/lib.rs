//! AutoML Core - orchestration engine for tabular machine learning
//!
//! Given a dataset and a target column this crate detects the learning
//! problem, builds a reproducible preprocessing plan, trains and evaluates
//! native estimators, compares them and searches their hyperparameters.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Typed columns and polars conversion
//! - [`utils`] - File loading and descriptive statistics
//! - [`autopipeline`] - Problem type detection
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Imputation, encoding, scaling and splitting
//! - [`synthetic`] - SMOTE oversampling
//! - [`training`] - Model registry, estimators, metrics and comparison
//! - [`optimizer`] - Hyperparameter search (random, TPE)
//! - [`analysis`] - Bias scan, EDA and learning curves
//!
//! ## Orchestration
//! - [`session`] - Session state machine and model artifacts
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use automl_core::prelude::*;
//!
//! # fn main() -> automl_core::Result<()> {
//! let dataset = DataLoader::new().load_dataset("houses.csv".as_ref())?;
//! let mut session = Session::new(SessionConfig::default());
//! session.load(dataset)?;
//! session.set_target("price")?;
//! session.preprocess()?;
//! let report = session.train("rf", None)?;
//! println!("{:?}", report.metrics);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod utils;
pub mod autopipeline;

// Core ML modules
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod optimizer;
pub mod analysis;

// Orchestration
pub mod session;
pub mod cli;

pub use error::{AutoMlError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AutoMlError, Result};

    // Data
    pub use crate::data::{ColumnData, Dataset, SemanticType};
    pub use crate::utils::DataLoader;
    pub use crate::autopipeline::{ProblemType, ProblemTypeDetector, TargetSpec};

    // Preprocessing
    pub use crate::preprocessing::{PreprocessingConfig, PreprocessingPlan, Preprocessor, Split};

    // Training
    pub use crate::training::{
        ComparisonTable, ModelMetrics, ModelParams, ModelType, Trainer, TrainingReport,
    };

    // Optimization
    pub use crate::optimizer::{HyperparameterTuner, OptimizationConfig, SearchSpace, TuningResult};

    // Analysis
    pub use crate::analysis::{BiasReport, EdaReport, LearningCurve};

    // Session
    pub use crate::session::{ModelArtifact, Predictions, Session, SessionConfig, SharedSession};
}
