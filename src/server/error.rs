//! Error types for the server

use crate::error::PlatformError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Platform(e) => platform_status(e),
        }
    }
}

fn platform_status(e: &PlatformError) -> StatusCode {
    match e {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        PlatformError::DataUnavailable(_) => StatusCode::BAD_REQUEST,
        PlatformError::NotFound(_) => StatusCode::NOT_FOUND,
        PlatformError::NameCollision(_) => StatusCode::CONFLICT,
        PlatformError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
            ServerError::Platform(e @ (PlatformError::ModelFileMissing(_) | PlatformError::ContractMissing(_))) => {
                tracing::error!(detail = %e, "Endpoint cannot be served");
                match e {
                    PlatformError::ModelFileMissing(_) => "Trained model file not found for this API".to_string(),
                    _ => "API does not have input column metadata".to_string(),
                }
            }
            ServerError::Platform(PlatformError::Training(msg)) => {
                tracing::error!(detail = %msg, "Training error");
                "Training failed. Check server logs for details.".to_string()
            }
            ServerError::Platform(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(detail = %e, "Internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
