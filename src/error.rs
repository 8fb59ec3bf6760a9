//! Error types for the ML platform

use thiserror::Error;

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Main error type for the platform
#[derive(Error, Debug)]
pub enum PlatformError {
    // Training
    #[error("No dataset associated with handle {0}")]
    DataUnavailable(i64),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Dataset is empty after train/test split ({rows} rows)")]
    EmptyDataset { rows: usize },

    #[error("Training error: {0}")]
    Training(String),

    // Generation
    #[error("Endpoint name already in use: {0}")]
    NameCollision(String),

    // Serving
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Trained model file not found: {0}")]
    ModelFileMissing(String),

    #[error("Endpoint does not have input column metadata: {0}")]
    ContractMissing(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    // Infrastructure
    #[error("Data error: {0}")]
    Data(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PlatformError {
    /// Whether the caller can fix the request and retry
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlatformError::Schema(_)
                | PlatformError::EmptyDataset { .. }
                | PlatformError::MalformedPayload(_)
                | PlatformError::MissingColumns(_)
        )
    }
}

impl From<polars::error::PolarsError> for PlatformError {
    fn from(err: polars::error::PolarsError) -> Self {
        PlatformError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for PlatformError {
    fn from(err: bincode::Error) -> Self {
        PlatformError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PlatformError {
    fn from(err: ndarray::ShapeError) -> Self {
        PlatformError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
