//! Centralized error types for the Walkie core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
            Self::Timeout => "store_timeout",
            Self::DuplicateKey(_) => "store_duplicate_key",
        }
    }
}

/// Application-wide error type.
///
/// Clients treat `NotFound` and `Conflict` as "please retry" and
/// `StorageUnavailable` as a connectivity failure.
#[derive(Debug, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum WalkieError {
    /// Referenced session, or explicitly targeted room, does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target room is full or inactive at assignment time, or the session
    /// is busy with another request. Retry matchmaking.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation is not allowed in the current state (e.g. recording while
    /// not in an active room).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Storage collaborator unreachable or timed out.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Server configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalkieError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidRequest(_) => "invalid_request",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StorageUnavailable(_) | Self::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type WalkieResult<T> = Result<T, WalkieError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for WalkieError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for WalkieError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(_) => Self::Internal(err.to_string()),
            StoreError::Unavailable(_) | StoreError::Timeout => {
                Self::StorageUnavailable(format!("{} ({})", err, err.code()))
            }
        }
    }
}

impl From<JsonRejection> for WalkieError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for WalkieError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = WalkieError::Conflict("room full".into());
        assert_eq!(err.code(), "conflict");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_state_maps_to_422() {
        let err = WalkieError::InvalidState("not in a room".into());
        assert_eq!(err.code(), "invalid_state");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn store_timeout_becomes_storage_unavailable() {
        let err: WalkieError = StoreError::Timeout.into();
        assert!(matches!(err, WalkieError::StorageUnavailable(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn duplicate_key_becomes_internal() {
        let err: WalkieError = StoreError::DuplicateKey("s1".into()).into();
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn error_response_carries_code_and_status() {
        let response = WalkieError::NotFound("session s1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
