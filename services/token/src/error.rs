//! Error types for the token service.

use key_common::KeyError;
use thiserror::Error;

/// Errors raised while managing signing keys and issuing tokens.
#[derive(Error, Debug)]
pub enum TokenError {
    /// No usable signing key: rotation never succeeded, or key generation failed
    #[error("Key initialization error: {0}")]
    KeyInitialization(String),

    /// Header parameter that cannot be carried in a token header
    #[error("Invalid header parameter: {0}")]
    InvalidHeader(String),

    /// Token request is missing required data
    #[error("Invalid token request: {0}")]
    InvalidRequest(String),

    /// Signing or serialization failed
    #[error("JWT encoding error: {0}")]
    JwtEncoding(String),

    /// Key history rejected or failed to store a record
    #[error("Key history error: {0}")]
    History(#[from] KeyError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenError {
    /// Create a key initialization error.
    #[must_use]
    pub fn key_init(msg: impl Into<String>) -> Self {
        Self::KeyInitialization(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same operation can succeed.
    ///
    /// Only storage failures of the key history are transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::History(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::KeyInitialization(_) => TOKEN_KEY_INITIALIZATION,
            Self::InvalidHeader(_) | Self::InvalidRequest(_) => TOKEN_INVALID_REQUEST,
            Self::JwtEncoding(_) => TOKEN_ENCODING_FAILED,
            Self::History(_) => TOKEN_KEY_HISTORY,
            Self::Config(_) => TOKEN_CONFIG,
            Self::Internal(_) => TOKEN_INTERNAL,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::JwtEncoding(err.to_string())
    }
}

/// No signing key is available.
pub const TOKEN_KEY_INITIALIZATION: &str = "TOKEN_KEY_INITIALIZATION";
/// Token request was rejected.
pub const TOKEN_INVALID_REQUEST: &str = "TOKEN_INVALID_REQUEST";
/// Signing failed.
pub const TOKEN_ENCODING_FAILED: &str = "TOKEN_ENCODING_FAILED";
/// Key history failure.
pub const TOKEN_KEY_HISTORY: &str = "TOKEN_KEY_HISTORY";
/// Configuration failure.
pub const TOKEN_CONFIG: &str = "TOKEN_CONFIG";
/// Internal failure.
pub const TOKEN_INTERNAL: &str = "TOKEN_INTERNAL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TokenError::key_init("no key").code(), TOKEN_KEY_INITIALIZATION);
        assert_eq!(TokenError::config("bad").code(), TOKEN_CONFIG);
        assert_eq!(
            TokenError::from(KeyError::EmptyBatch).code(),
            TOKEN_KEY_HISTORY
        );
    }

    #[test]
    fn test_display() {
        let err = TokenError::key_init("no rotation has succeeded yet");
        assert_eq!(
            err.to_string(),
            "Key initialization error: no rotation has succeeded yet"
        );
    }
}
