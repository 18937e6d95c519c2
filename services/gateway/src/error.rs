//! Custom error types for the gateway
//!
//! These are request/response failures raised before any event stream is
//! opened. Failures after the stream headers are sent travel as in-stream
//! `error` events instead.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the gateway API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Bad, expired or unknown credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown resource, or one owned by another user
    #[error("{0}")]
    NotFound(String),

    /// Unique key already taken
    #[error("{0}")]
    Conflict(String),

    /// Client exceeded the request rate
    #[error("Too many requests")]
    TooManyRequests,

    /// Internal server error
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => ApiError::Conflict(format!("{} already exists", what)),
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            StoreError::Backend(_) => ApiError::Internal(err.into()),
        }
    }
}

/// Unreadable JSON bodies are reported like any other bad input
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            error!("Internal error: {:#}", source);
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
