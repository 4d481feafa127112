//! Error types for the session controller

use thiserror::Error;

use crate::state::TokenKind;

/// Message shown for every anti-forgery failure during the login callback.
///
/// State and nonce mismatches share it so the UI never reveals which check failed.
pub const LOGIN_FAILED_MESSAGE: &str = "Something went wrong while signing in";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Identity token decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not a JWT")]
    Malformed,

    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("invalid claims payload: {0}")]
    Json(String),
}

/// Errors raised by an [`HttpTransport`](crate::transport::HttpTransport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("HTTP error: {status}")]
    Status { status: u16, detail: Option<String> },
}

impl TransportError {
    /// Status code of the failed response, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Network(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Main error type for session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Could not validate credentials")]
    InvalidCredentials,

    #[error("idToken: {0}")]
    Claims(#[from] ClaimsError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("No {0} available")]
    MissingToken(TokenKind),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("{}", LOGIN_FAILED_MESSAGE)]
    StateMismatch,

    #[error("{}", LOGIN_FAILED_MESSAGE)]
    NonceMismatch,

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        SessionError::MalformedResponse(msg.into())
    }

    /// Text for the error notification.
    ///
    /// Backend failures carry the `detail` of the error body when there is one.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Transport(TransportError::Status {
                detail: Some(detail),
                ..
            }) => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatches_share_message() {
        assert_eq!(
            SessionError::StateMismatch.to_string(),
            SessionError::NonceMismatch.to_string()
        );
        assert_eq!(SessionError::StateMismatch.to_string(), LOGIN_FAILED_MESSAGE);
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let err = SessionError::from(TransportError::Status {
            status: 400,
            detail: Some("invalid_grant".to_string()),
        });
        assert_eq!(err.user_message(), "invalid_grant");

        let err = SessionError::from(TransportError::Status {
            status: 502,
            detail: None,
        });
        assert_eq!(err.user_message(), "HTTP error: 502");
    }

    #[test]
    fn test_unauthorized() {
        let err = TransportError::Status {
            status: 401,
            detail: None,
        };
        assert!(err.is_unauthorized());
        assert!(!TransportError::Network("offline".into()).is_unauthorized());
    }
}
