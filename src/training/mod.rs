//! Model training module
//!
//! Native estimators behind a closed model registry:
//! - Decision trees, random forests, extra trees and bagging
//! - Gradient boosting and AdaBoost
//! - Linear models (OLS, logistic, ridge, lasso)
//! - Support vector machines
//! - K-nearest neighbors
//!
//! [`Trainer`] fits a registry entry on a preprocessed [`Split`](crate::preprocessing::Split)
//! and evaluates it; [`compare_models`] lines up the stored records.

mod comparison;
mod config;
mod engine;
mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use comparison::{compare_models, ComparisonTable, ModelComparison};
pub use config::{
    AdaBoostParams, Capabilities, ForestParams, LinearParams, ModelParams, ModelType,
    PenalizedParams, TreeParams,
};
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use engine::{fit_model, FeatureImportance, TrainedModel, TrainedModelRecord, Trainer, TrainingReport};
pub use models::{ModelMetrics, CLASSIFICATION_METRICS, REGRESSION_METRICS};

pub use adaboost::{AdaBoostClassifier, AdaBoostRegressor};
pub use decision_tree::{Criterion, DecisionTree, Splitter, TreeNode};
pub use extra_trees::ExtraTrees;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{LassoRegression, LinearRegression, LogisticRegression, RidgeRegression};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{KernelType, SVMClassifier, SVMConfig, SVMRegressor};
