//! # Error Handling
//!
//! Every operation in the service returns an [`AppResult`]. Handlers convert the
//! error into exactly one JSON response body of the form `{"error": "..."}`.

use serde_json::json;
use thiserror::Error;
use worker::{Error as WorkerError, Response};

use crate::constants::UNAUTHORIZED_MESSAGE;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
    #[error("{0}")]
    Validation(String),
    /// Credential mismatch, unknown token or missing token. The message never
    /// varies so callers cannot tell the causes apart.
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },
    #[error("{0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::Storage(_) => 400,
            AppError::Unauthorized => 401,
            AppError::NotFound(_) => 404,
            AppError::Upload { .. } | AppError::Configuration(_) | AppError::Worker(_) => 500,
        }
    }

    pub fn error_body(&self) -> serde_json::Value {
        match self {
            AppError::Unauthorized => json!({ "error": UNAUTHORIZED_MESSAGE }),
            other => json!({ "error": other.to_string() }),
        }
    }

    /// Builds the single JSON error response for this failure.
    pub fn to_response(&self) -> worker::Result<Response> {
        Ok(Response::from_json(&self.error_body())?.with_status(self.status_code()))
    }
}

impl From<AppError> for WorkerError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Worker(e) => e,
            other => WorkerError::RustError(other.to_string()),
        }
    }
}
