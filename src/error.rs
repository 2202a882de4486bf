//! Global error handling module for the stream finder API
//!
//! Crawling and sniffing fail softly and never produce errors here. What is
//! left are startup failures (site profile, script overrides) and request
//! problems, converted to HTTP responses with a consistent JSON body.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::ApiError;
use crate::sniffer::SnifferError;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Site profile could not be loaded or compiled
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sniffer setup errors (script overrides)
    #[error("Sniffer error: {0}")]
    Sniffer(#[from] SnifferError),

    /// Validation errors (bad request)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Sniffer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Config(_) => "Service is misconfigured".to_string(),
            AppError::Sniffer(SnifferError::Status { status, .. }) => {
                format!("Automation endpoint returned error status: {}", status)
            }
            AppError::Sniffer(_) => "Stream sniffer is unavailable".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_response = ApiError::new(self.user_message());

        HttpResponse::build(status).json(error_response)
    }
}

/// Result type alias for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
