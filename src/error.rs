//! Centralized error handling module
//!
//! Backend client failures (`ClientError`) and the HTTP-facing `AppError`,
//! with the JSON error body returned to dashboard clients.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::client::Resource;

/// Failure of a single backend call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{resource} request failed with status {status}")]
    RequestFailed { resource: Resource, status: u16 },

    #[error("{resource} response did not match the expected shape")]
    MalformedResponse { resource: Resource },

    #[error("{resource} request timed out")]
    Timeout { resource: Resource },

    #[error("{resource} backend unreachable: {reason}")]
    Transport { resource: Resource, reason: String },

    #[error("invalid {resource} request: {reason}")]
    InvalidRequest { resource: Resource, reason: String },
}

impl ClientError {
    pub fn resource(&self) -> Resource {
        match self {
            ClientError::RequestFailed { resource, .. }
            | ClientError::MalformedResponse { resource }
            | ClientError::Timeout { resource }
            | ClientError::Transport { resource, .. }
            | ClientError::InvalidRequest { resource, .. } => *resource,
        }
    }

    /// Short machine-readable label used in logs and sync reports
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::RequestFailed { .. } => "request_failed",
            ClientError::MalformedResponse { .. } => "malformed_response",
            ClientError::Timeout { .. } => "timeout",
            ClientError::Transport { .. } => "transport",
            ClientError::InvalidRequest { .. } => "invalid_request",
        }
    }
}

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Backend error: {0}")]
    Upstream(#[from] ClientError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Standardized error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Unique correlation ID for tracing
    pub correlation_id: String,
    /// Error type classification
    pub error_type: String,
    /// Human-readable error message (safe for clients)
    pub message: String,
    /// HTTP status code
    pub status_code: u16,
    /// Timestamp of the error
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str, status_code: StatusCode) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            status_code: status_code.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

fn upstream_status(err: &ClientError) -> StatusCode {
    match err {
        ClientError::RequestFailed { status: 404, .. } => StatusCode::NOT_FOUND,
        ClientError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        ClientError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ClientError::RequestFailed { .. }
        | ClientError::MalformedResponse { .. }
        | ClientError::Transport { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, message) = match self {
            AppError::ValidationError(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::Upstream(err) => ("BACKEND_ERROR", err.to_string()),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
        };

        let error_response = ErrorResponse::new(error_type, &message, status);

        error!(
            correlation_id = %error_response.correlation_id,
            error_type = %error_type,
            status_code = %status.as_u16(),
            "Error response generated"
        );

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(err) => upstream_status(err),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
