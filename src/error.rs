//! Error types for the AutoML core

use thiserror::Error;

/// Result type alias for AutoML operations
pub type Result<T> = std::result::Result<T, AutoMlError>;

/// Main error type for the AutoML core
#[derive(Error, Debug)]
pub enum AutoMlError {
    #[error("Column '{0}' not found in data")]
    ColumnNotFound(String),

    #[error("Target column not set. Please set the target column first")]
    TargetNotSet,

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Data not preprocessed. Please preprocess data first")]
    NotPreprocessed,

    #[error("Invalid model type '{name}'. Available models: {}", available.join(", "))]
    UnknownModelType { name: String, available: Vec<String> },

    #[error("{model} is not suitable for {problem} problems")]
    IncompatibleModel { model: String, problem: String },

    #[error("No models available for comparison")]
    NoModelsAvailable,

    #[error("Unsupported cross-validation strategy: {0}")]
    UnsupportedTuningStrategy(String),

    #[error("Hyperparameter tuning is not supported for model type '{0}'")]
    UnsupportedTuningModel(String),

    #[error("No model has been trained yet")]
    NoTrainedModel,

    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AutoMlError {
    /// Build an `InvalidParameter` error
    pub fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        AutoMlError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for AutoMlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoMlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoMlError {
    fn from(err: serde_json::Error) -> Self {
        AutoMlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoMlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoMlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoMlError::ColumnNotFound("price".to_string());
        assert_eq!(err.to_string(), "Column 'price' not found in data");
    }

    #[test]
    fn test_unknown_model_lists_available() {
        let err = AutoMlError::UnknownModelType {
            name: "xyz".to_string(),
            available: vec!["dt".to_string(), "rf".to_string()],
        };
        assert_eq!(err.to_string(), "Invalid model type 'xyz'. Available models: dt, rf");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoMlError = io_err.into();
        assert!(matches!(err, AutoMlError::IoError(_)));
    }
}
