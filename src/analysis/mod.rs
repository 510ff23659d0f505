//! Data and model diagnostics
//!
//! Read-only reports over the loaded dataset and the preprocessed split:
//! - Class imbalance and feature distribution scan ([`BiasAnalyzer`])
//! - Exploratory data analysis with preprocessing recommendations
//! - Cross-validated learning curves

mod bias;
mod eda;
mod learning_curve;

pub use bias::{BiasAnalyzer, BiasReport, FeatureStatistics};
pub use eda::{
    perform_eda, EdaReport, EdaSummary, FeatureAnalysis, NumericSummary, Recommendations,
    TargetAnalysis,
};
pub use learning_curve::{LearningCurve, LearningCurveBuilder, LearningCurvePoint};
