//! Error types for talking to Freesound and storing what it returns.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while fetching samples.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No Freesound API key was configured.
    #[error("FREESOUND_API_KEY not found in environment or passed explicitly")]
    MissingApiKey,

    /// Freesound answered with an unexpected HTTP status.
    #[error("HTTP {status} from Freesound: {message}")]
    Http { status: StatusCode, message: String },

    /// Freesound returned a rate-limit response.
    #[error("rate limited by Freesound")]
    RateLimited,

    /// A response body could not be parsed.
    #[error("parse error from Freesound: {message}")]
    Parse { message: String },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Writing a download or the metadata log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata could not be serialised.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error propagated from the catalog.
    #[error("database error: {0}")]
    Database(#[from] soundseek_core::Error),
}

impl FetchError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Http { status, .. } => status.is_server_error(),
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Classify a non-success status.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else {
            Self::Http {
                status,
                message: message.into(),
            }
        }
    }
}

/// Convenience alias for fetch results.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        let err = FetchError::from_status(StatusCode::BAD_GATEWAY, "upstream");
        assert!(err.is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let err = FetchError::from_status(StatusCode::UNAUTHORIZED, "bad token");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_too_many_requests_is_rate_limited() {
        let err = FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, FetchError::RateLimited));
        assert!(err.is_transient());
    }

    #[test]
    fn test_missing_key_message() {
        assert!(FetchError::MissingApiKey
            .to_string()
            .contains("FREESOUND_API_KEY"));
    }
}
