//! Error type for key model, history and rotation-event operations.

use thiserror::Error;

/// Errors raised by key records, key histories and rotation events.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Algorithm name is not one of the supported signing algorithms
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Encoded public key cannot be decoded for its declared algorithm
    #[error("Invalid key material for {kid}: {reason}")]
    InvalidKeyMaterial {
        /// Key id of the offending record
        kid: String,
        /// What was wrong with the material
        reason: String,
    },

    /// Public key is below the minimum strength
    #[error("Key {kid} is too weak: {bits} bits, minimum is {minimum}")]
    WeakKey {
        /// Key id of the offending record
        kid: String,
        /// Actual strength in bits
        bits: usize,
        /// Required minimum in bits
        minimum: usize,
    },

    /// History capacity of zero was requested
    #[error("Invalid history capacity: must be at least 1")]
    InvalidCapacity,

    /// `add_all` was called without records
    #[error("Refusing to add an empty batch of key records")]
    EmptyBatch,

    /// Rotation event payload is inconsistent
    #[error("Invalid rotation event: {0}")]
    InvalidEvent(String),

    /// Durable history backend failed
    #[error("Key history storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyError {
    /// Check if this error is retryable.
    ///
    /// Only storage failures are transient; everything else is a property of
    /// the input and will fail again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Create an invalid key material error.
    #[must_use]
    pub fn invalid_material(kid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial {
            kid: kid.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid event error with the given message.
    #[must_use]
    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }
}

impl From<std::io::Error> for KeyError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(KeyError::Storage("disk full".to_string()).is_retryable());
        assert!(!KeyError::EmptyBatch.is_retryable());
        assert!(!KeyError::InvalidCapacity.is_retryable());
        assert!(!KeyError::invalid_event("missing kid").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = KeyError::WeakKey {
            kid: "k1".to_string(),
            bits: 1024,
            minimum: 2048,
        };
        assert_eq!(err.to_string(), "Key k1 is too weak: 1024 bits, minimum is 2048");

        let err: KeyError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, KeyError::Storage(_)));
    }
}
