//! Error types for FinGraph services
//!
//! Provides a single error enum shared by the graph, market data and
//! pipeline layers with:
//! - Machine-readable error codes
//! - HTTP status code mapping
//! - Structured error responses

use crate::market::ProviderAttempt;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,
    UnknownSymbol,

    // Resource errors (4xxx)
    ConceptNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    AllProvidersExhausted,
    UpstreamModelFailure,
    CacheError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    InvalidKnowledgeBase,
    RuleSyntax,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::UnknownSymbol => 1005,

            ErrorCode::ConceptNotFound => 4002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::AllProvidersExhausted => 8003,
            ErrorCode::UpstreamModelFailure => 8004,
            ErrorCode::CacheError => 8006,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::InvalidKnowledgeBase => 9004,
            ErrorCode::RuleSyntax => 9005,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Unknown symbol '{symbol}' for {kind}")]
    UnknownSymbol { kind: String, symbol: String },

    // Resource errors
    #[error("Concept not found: {id}")]
    ConceptNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per window")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("All providers exhausted for {kind} {symbol} ({} attempted)", .attempts.len())]
    AllProvidersExhausted {
        kind: String,
        symbol: String,
        attempts: Vec<ProviderAttempt>,
    },

    #[error("Language model failure: {message}")]
    UpstreamModelFailure { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid knowledge base: {message}")]
    InvalidKnowledgeBase { message: String },

    #[error("Invalid rule '{rule}': {message}")]
    RuleSyntax { rule: String, message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::UnknownSymbol { .. } => ErrorCode::UnknownSymbol,
            AppError::ConceptNotFound { .. } => ErrorCode::ConceptNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::AllProvidersExhausted { .. } => ErrorCode::AllProvidersExhausted,
            AppError::UpstreamModelFailure { .. } => ErrorCode::UpstreamModelFailure,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::InvalidKnowledgeBase { .. } => ErrorCode::InvalidKnowledgeBase,
            AppError::RuleSyntax { .. } => ErrorCode::RuleSyntax,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::UnknownSymbol { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::ConceptNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::InvalidKnowledgeBase { .. }
            | AppError::RuleSyntax { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::UpstreamModelFailure { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::AllProvidersExhausted { .. } | AppError::CacheError { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::AllProvidersExhausted { kind, symbol, attempts } => Some(serde_json::json!({
                "kind": kind,
                "symbol": symbol,
                "attempts": attempts,
            })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
