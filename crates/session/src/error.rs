//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the session client
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error, including timeouts
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server rejected the credentials and no refresh was attempted
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The refresh cycle failed and stored credentials were cleared
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other client-side rejection (4xx)
    #[error("Request rejected {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A stored token cannot be encoded as a header value
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Token store failure
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            code if code < 500 => Self::Rejected {
                status: code,
                message,
            },
            code => Self::ServerError {
                status: code,
                message,
            },
        }
    }

    /// Whether the caller has to log in again
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::SessionExpired(_))
    }

    /// Whether the underlying transport timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Rejected { status, .. } | Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Token store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing storage cannot be reached (locked, permission denied, ...)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted state exists but cannot be decoded
    #[error("corrupt token storage: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        let err = ClientError::from_status(StatusCode::UNAUTHORIZED, "expired".into());
        assert!(matches!(err, ClientError::AuthenticationFailed(ref m) if m == "expired"));
        assert!(err.is_auth_expired());

        assert!(matches!(
            ClientError::from_status(StatusCode::FORBIDDEN, String::new()),
            ClientError::Forbidden(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::NOT_FOUND, String::new()),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_REQUEST, String::new()),
            ClientError::BadRequest(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::CONFLICT, String::new()),
            ClientError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            ClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn test_status_accessor() {
        let err = ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "invalid".into());
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_auth_expired());

        let err = ClientError::SessionExpired("refresh rejected".into());
        assert_eq!(err.status(), None);
        assert!(err.is_auth_expired());
    }
}
