use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{respond::json_response, services::token::TokenError};

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// No entity matches the key.
    #[error("Resource not found")]
    NotFound,

    /// Malformed input to an entity operation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The durable store rejected a write because the key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A durable store call exceeded its deadline.
    #[error("Store timed out after {0:?}")]
    StoreTimeout(Duration),

    /// The durable store failed or could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The cache failed or could not be reached.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// A session token was missing or rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        if let Some(db_error) = e.as_db_error() {
            if *db_error.code() == tokio_postgres::error::SqlState::UNIQUE_VIOLATION {
                return AppError::Conflict(db_error.message().to_string());
            }
            if *db_error.code() == tokio_postgres::error::SqlState::FOREIGN_KEY_VIOLATION {
                return AppError::Validation(db_error.message().to_string());
            }
        }
        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        match e {
            deadpool_postgres::PoolError::Backend(e) => AppError::from(e),
            other => AppError::StoreUnavailable(format!("Pool error: {}", other)),
        }
    }
}

impl From<deadpool_postgres::CreatePoolError> for AppError {
    fn from(e: deadpool_postgres::CreatePoolError) -> Self {
        AppError::StoreUnavailable(format!("Pool creation error: {}", e))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::CacheUnavailable(e.to_string())
    }
}

impl From<sonic_rs::Error> for AppError {
    fn from(e: sonic_rs::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, "Resource already exists".to_string())
            }

            AppError::StoreTimeout(ref deadline) => {
                tracing::error!("Store timed out after {:?}", deadline);
                (StatusCode::GATEWAY_TIMEOUT, "Store timeout".to_string())
            }

            AppError::StoreUnavailable(ref msg) => {
                tracing::error!("Store error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".to_string())
            }

            AppError::CacheUnavailable(ref msg) => {
                tracing::error!("Cache error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Cache unavailable".to_string())
            }

            AppError::Token(TokenError::Signing(ref msg)) => {
                tracing::error!("Token signing failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Token(ref e) => {
                tracing::warn!("Token rejected: {}", e);
                let body = sonic_rs::to_string(&sonic_rs::json!({
                    "error": e.public_message(),
                    "code": e.public_code(),
                }))
                .unwrap_or_else(|_| r#"{"error":"Unauthorized"}"#.to_string());
                return json_response(StatusCode::UNAUTHORIZED, body);
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Serialization(ref msg) => {
                tracing::error!("Serialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        json_response(status, body)
    }
}
