//! Unified error handling for the server.

use crate::accounts::AccountError;
use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shelf_engine::Error as EngineError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            field: None,
            reason: None,
        }
    }
}

fn engine_response(e: &EngineError) -> (StatusCode, ErrorResponse) {
    match e {
        EngineError::Validation(v) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                error: v.to_string(),
                field: v.field().map(str::to_string),
                reason: Some(v.reason()),
            },
        ),
        EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorResponse::message(e.to_string())),
        EngineError::Conflict { .. } => (StatusCode::CONFLICT, ErrorResponse::message(e.to_string())),
        EngineError::BackendUnavailable(_) => {
            tracing::error!(error = %e, "backend unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::message("Backend unavailable"),
            )
        }
        EngineError::SchemaDefinition(_) | EngineError::Storage(_) | EngineError::Invariant { .. } => {
            tracing::error!(error = %e, "engine error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::message(e.to_string()),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Engine(e) | AppError::Account(AccountError::Engine(e)) => engine_response(e),
            AppError::Account(e @ AccountError::Hash(_)) => {
                tracing::error!(error = %e, "account error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::message("Internal server error"),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::message(msg.clone())),
            AppError::UnknownCollection(_) => {
                (StatusCode::NOT_FOUND, ErrorResponse::message(self.to_string()))
            }
            AppError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::message("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
