//! Error types for the document QA service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad request shape, disallowed type, oversize file, empty query
    #[error("{0}")]
    Validation(String),

    /// Upload hash matched an existing document; carries the existing id
    #[error("duplicate content, matches document {existing_id}")]
    DuplicateContent { existing_id: String },

    /// Missing identifier
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal document status transition
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Embedding provider failure (timeout, rate-limit, 5xx)
    #[error("embedding provider: {0}")]
    EmbeddingProvider(String),

    /// Chat completion provider failure
    #[error("chat provider: {0}")]
    ChatProvider(String),

    /// Text extraction failure
    #[error("{0}")]
    Parse(String),

    /// Persistence failure
    #[error("storage: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration: {0}")]
    Config(String),

    /// IO error
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::DuplicateContent { existing_id } => (
                StatusCode::CONFLICT,
                "duplicate_content",
                format!("content already ingested as document {}", existing_id),
            ),
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("not found: {}", what),
            ),
            // Internal invariant; the raw transition is never surfaced
            Error::InvalidTransition { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error".to_string(),
            ),
            Error::EmbeddingProvider(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "embedding_unavailable",
                msg.clone(),
            ),
            Error::ChatProvider(msg) => (StatusCode::BAD_GATEWAY, "chat_failed", msg.clone()),
            Error::Parse(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "parse_error", msg.clone()),
            Error::Store(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg.clone()),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
