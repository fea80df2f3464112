//! Error types for backend calls and the session store

use std::io;
use thiserror::Error;

/// Result type alias for backend operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for session store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the CRM backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request never produced a response (connect, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API returned error {status}{}", detail_suffix(.detail.as_deref()))]
    Status {
        /// HTTP status code
        status: u16,
        /// `detail` field of the error body, if any
        detail: Option<String>,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode {endpoint} response: {message}")]
    Decode {
        /// Endpoint path
        endpoint: String,
        /// Decoder message
        message: String,
    },

    /// Authenticated call attempted without a bearer token
    #[error("No active session")]
    Unauthenticated,
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// Create a status error
    pub fn status(status: u16, detail: Option<String>) -> Self {
        Self::Status { status, detail }
    }

    /// Create a decode error
    pub fn decode(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Backend-supplied `detail` message
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// HTTP status, when the backend answered
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the caller's credentials
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Status {
                status: 401 | 403,
                ..
            } | Self::Unauthenticated
        )
    }

    /// Detail message when present, otherwise `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail()
            .filter(|d| !d.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Errors raised by session store backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file operation failed
    #[error("Session store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored value could not be encoded or decoded
    #[error("Session store value for {key} is invalid: {source}")]
    Json {
        /// Key being read or written
        key: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Key contains characters that cannot name a file
    #[error("Invalid session store key: {key}")]
    InvalidKey {
        /// Offending key
        key: String,
    },
}

impl StoreError {
    /// Create a JSON error for a key
    pub fn json(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            key: key.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_display_includes_detail() {
        let err = ApiError::status(400, Some("Invalid date range".to_string()));
        assert_eq!(err.to_string(), "API returned error 400: Invalid date range");

        let bare = ApiError::status(503, None);
        assert_eq!(bare.to_string(), "API returned error 503");
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let fallback = "Unable to load dashboard analytics. Please try again.";

        let with_detail = ApiError::status(403, Some("Not allowed for this project".to_string()));
        assert_eq!(with_detail.user_message(fallback), "Not allowed for this project");

        let empty_detail = ApiError::status(500, Some(String::new()));
        assert_eq!(empty_detail.user_message(fallback), fallback);

        let decode = ApiError::decode("/dashboard/admin/", "expected object");
        assert_eq!(decode.user_message(fallback), fallback);
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(ApiError::status(401, None).is_unauthorized());
        assert!(ApiError::status(403, None).is_unauthorized());
        assert!(ApiError::Unauthenticated.is_unauthorized());
        assert!(!ApiError::status(500, None).is_unauthorized());
        assert_eq!(ApiError::status(404, None).status_code(), Some(404));
    }
}
