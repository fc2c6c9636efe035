use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for scout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (generic transport-level failure).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Source adapter failed (remote run failed, aborted, or returned garbage).
    #[error("Source error: {0}")]
    SourceError(String),

    /// Notification channel call failed.
    #[error("Delivery error (HTTP {status_code}): {message}")]
    DeliveryError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// The channel asked us to back off for a specific cooldown.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Remote sync (mirror store) call failed.
    #[error("Sync error: {0}")]
    SyncError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimited { .. } => true,
            AppError::DeliveryError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(
            AppError::RateLimited {
                retry_after: Duration::from_secs(5)
            }
            .is_retryable()
        );
        assert!(
            AppError::DeliveryError {
                message: "server error".into(),
                status_code: 500,
                retryable: true,
            }
            .is_retryable()
        );
        assert!(
            !AppError::DeliveryError {
                message: "bad request".into(),
                status_code: 400,
                retryable: false,
            }
            .is_retryable()
        );
        assert!(!AppError::ConfigError("missing key".into()).is_retryable());
    }
}
