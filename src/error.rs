// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::TransitionError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The run's status does not allow the requested transition.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The run was finished, but too few positions exist to compute a distance.
    #[error("Insufficient data: {0}")]
    InsufficientData(&'static str),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body.
///
/// Client errors carry a human-readable `detail`; server-side failures and
/// degraded results carry an `error` string instead.
#[derive(Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ErrorResponse {
    fn detail(msg: impl Into<String>) -> Self {
        Self {
            detail: Some(msg.into()),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            detail: None,
            error: Some(msg.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::InvalidState(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::detail(*msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::detail(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::detail(msg.clone()))
            }
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::detail(errors.to_string()))
            }
            AppError::InsufficientData(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorResponse::error(*msg))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::error("database_error"),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::error("internal_error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidState(err.message())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
