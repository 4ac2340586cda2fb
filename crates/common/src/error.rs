//! Error types for the delayed notifier.
//!
//! This module provides a unified error type for the entire application,
//! with automatic conversion from common error types using the `#[from]`
//! attribute. Background tasks use [`AppError::is_transient`] to decide
//! whether an operation is worth retrying.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Client errors (4xx) carry the status the HTTP layer should answer with;
/// everything else surfaces as an internal server error. Identity of the
/// variant is preserved through all layers so callers can match on kind.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors (4xx) ===
    /// No such row in the durable store.
    #[error("Data not found: {0}")]
    DataNotFound(String),

    /// No notification with the requested id.
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    /// Unique constraint violation on insert.
    #[error("Conflicting data: {0}")]
    ConflictingData(String),

    /// Validation failed with structured errors.
    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    /// Validation failed with a message.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The user has no link for the requested channel.
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// Cancel attempted on an already-sent notification.
    #[error("Notification already sent: {0}")]
    NotificationAlreadySent(String),

    /// Cancel attempted on an already-cancelled notification.
    #[error("Notification already cancelled: {0}")]
    NotificationAlreadyCancelled(String),

    /// No sender registered for the channel.
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),

    // === Server Errors (5xx) ===
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// Message queue error.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// External service (SMTP, Telegram Bot API) error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::DataNotFound(_) | Self::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationErrors(_)
            | Self::Validation(_)
            | Self::RecipientNotFound(_)
            | Self::UnsupportedChannel(_) => StatusCode::BAD_REQUEST,
            Self::ConflictingData(_)
            | Self::NotificationAlreadySent(_)
            | Self::NotificationAlreadyCancelled(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Database(_)
            | Self::Redis(_)
            | Self::Queue(_)
            | Self::Config(_)
            | Self::ExternalService(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataNotFound(_) => "DATA_NOT_FOUND",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::ConflictingData(_) => "CONFLICTING_DATA",
            Self::ValidationErrors(_) | Self::Validation(_) => "VALIDATION_ERROR",
            Self::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            Self::NotificationAlreadySent(_) => "NOTIFICATION_ALREADY_SENT",
            Self::NotificationAlreadyCancelled(_) => "NOTIFICATION_ALREADY_CANCELLED",
            Self::UnsupportedChannel(_) => "UNSUPPORTED_CHANNEL",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether the failed operation may succeed on retry.
    ///
    /// Covers PostgreSQL serialization failures (SQLSTATE 40001), deadlocks
    /// (40P01) and transient connectivity loss toward the database, cache or
    /// broker.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(msg) => {
                msg.contains("40001")
                    || msg.contains("40P01")
                    || msg.contains("deadlock")
                    || msg.contains("serialization")
                    || msg.contains("connection reset")
                    || msg.contains("connection closed")
            }
            Self::Redis(_) | Self::Queue(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotificationNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RecipientNotFound("u1".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotificationAlreadySent("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ConflictingData("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Database("SQLSTATE 40001: serialization failure".into()).is_transient());
        assert!(AppError::Database("deadlock detected".into()).is_transient());
        assert!(AppError::Queue("push failed".into()).is_transient());
        assert!(!AppError::Database("syntax error".into()).is_transient());
        assert!(!AppError::Validation("empty payload".into()).is_transient());
        assert!(!AppError::NotificationNotFound("x".into()).is_transient());
    }
}
