//! Hyperparameter optimization module
//!
//! A sequential search over a bounded space:
//! - Random and Tree-structured Parzen Estimator (TPE) samplers
//! - Trial budget and wall-clock timeout
//! - Failing trials scored as the worst value instead of aborting
//!
//! [`HyperparameterTuner`] binds the search to registry models and a
//! cross-validation strategy.

mod config;
mod optimizer;
mod samplers;
mod search_space;
mod tuner;

pub use config::OptimizationConfig;
pub use optimizer::{Optimizer, Study, TrialResult};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use search_space::{params_to_json, Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use tuner::{search_space_for, HyperparameterTuner, TuningResult};
