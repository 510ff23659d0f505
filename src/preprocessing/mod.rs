//! Data preprocessing module
//!
//! Turns a typed [`Dataset`](crate::data::Dataset) into a leakage-free
//! train/test split. Steps run in a fixed order:
//! - Separate features and target
//! - Datetime decomposition into year/month/day
//! - Missing value imputation (mean / most frequent)
//! - Label encoding of categorical columns
//! - Standard scaling of numeric columns
//! - Train/test split (stratified for classification)
//! - SMOTE oversampling of an under-represented training class
//!
//! The fitted statistics are kept in a [`PreprocessingPlan`] so the same
//! transform can be replayed on new rows.

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;
mod split;

pub use config::PreprocessingConfig;
pub use encoder::LabelEncoder;
pub use imputer::{FillValue, ImputeStrategy, Imputer};
pub use pipeline::{DataShapes, PreprocessOutput, PreprocessSummary, PreprocessingPlan, Preprocessor, Split};
pub use scaler::StandardScaler;
pub use split::{test_size, train_test_split, SplitIndices};
