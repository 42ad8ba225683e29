//! Error types for flotilla

use thiserror::Error;

/// Result type alias for flotilla operations
pub type Result<T> = std::result::Result<T, FlotillaError>;

/// Main error type for flotilla
#[derive(Error, Debug)]
pub enum FlotillaError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted: call fit() before score()")]
    ModelNotFitted,

    #[error("Trait \"{trait_name}\" has {n_categories} distinct categories, need at least 2 to classify")]
    DegenerateTarget {
        trait_name: String,
        n_categories: usize,
    },

    #[error("Trait \"{trait_name}\" has {n_categories} categories (>2); enable allow_multiclass to proceed")]
    MultiClassTarget {
        trait_name: String,
        n_categories: usize,
    },

    #[error("No common samples between features ({n_feature_samples} samples) and trait ({n_target_samples} samples)")]
    EmptyAlignment {
        n_feature_samples: usize,
        n_target_samples: usize,
    },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for FlotillaError {
    fn from(err: polars::error::PolarsError) -> Self {
        FlotillaError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FlotillaError {
    fn from(err: serde_json::Error) -> Self {
        FlotillaError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FlotillaError {
    fn from(err: ndarray::ShapeError) -> Self {
        FlotillaError::ShapeError {
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
        let err = FlotillaError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FlotillaError = io_err.into();
        assert!(matches!(err, FlotillaError::IoError(_)));
    }

    #[test]
    fn test_empty_alignment_display() {
        let err = FlotillaError::EmptyAlignment {
            n_feature_samples: 10,
            n_target_samples: 4,
        };
        assert!(err.to_string().contains("10 samples"));
        assert!(err.to_string().contains("4 samples"));
    }
}
