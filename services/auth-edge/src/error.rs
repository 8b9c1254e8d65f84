//! Error handling module with type-safe, non-exhaustive error types
//!
//! This module provides:
//! - [`AuthEdgeError`], one variant per way a bearer token can be rejected
//! - [`AuthenticationFailure`], the sanitized outcome handed back to callers
//! - Conversion from `jsonwebtoken` errors

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AuthEdgeError {
    /// No bearer token in the request
    #[error("Token missing from request")]
    TokenMissing,

    /// Token is not a three-part JWS or a segment does not decode
    #[error("Token malformed: {reason}")]
    TokenMalformed {
        /// Description of the malformation
        reason: String,
    },

    /// No usable public key for the token's key id
    #[error("No usable public key for kid {kid}")]
    UnresolvedKey {
        /// Key id from the token header
        kid: String,
    },

    /// Signature does not verify under the resolved key
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// Required claims are missing or do not match
    #[error("Required claims invalid: {claims:?}")]
    ClaimsInvalid {
        /// Names of the failing claims
        claims: Vec<String>,
    },

    /// Token has expired
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },

    /// Token is on the blacklist
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Directory does not know the subject
    #[error("Unknown subject {subject}")]
    UnknownSubject {
        /// Subject claim of the token
        subject: String,
    },

    /// Directory reports the subject's account as disabled
    #[error("Account disabled for subject {subject}")]
    AccountDisabled {
        /// Subject claim of the token
        subject: String,
    },

    /// Blacklist or directory lookup failed
    #[error("Collaborator {service} failed: {reason}")]
    CollaboratorUnavailable {
        /// Name of the failing collaborator
        service: String,
        /// Failure description
        reason: String,
    },
}

/// Stable error codes for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No token presented
    TokenMissing,
    /// Token structure invalid
    TokenMalformed,
    /// Key id unknown, revoked or expired
    KeyUnresolved,
    /// Signature mismatch
    TokenInvalid,
    /// Claim check failed
    ClaimsInvalid,
    /// Token past its expiry
    TokenExpired,
    /// Token blacklisted
    TokenRevoked,
    /// Subject unknown or disabled
    AccountRejected,
    /// Collaborator lookup failed
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenMissing => "AUTH_TOKEN_MISSING",
            Self::TokenMalformed => "AUTH_TOKEN_MALFORMED",
            Self::KeyUnresolved => "AUTH_KEY_UNRESOLVED",
            Self::TokenInvalid => "AUTH_TOKEN_INVALID",
            Self::ClaimsInvalid => "AUTH_CLAIMS_INVALID",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::TokenRevoked => "AUTH_TOKEN_REVOKED",
            Self::AccountRejected => "AUTH_ACCOUNT_REJECTED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Umbrella outcome of a rejected authentication.
///
/// The message is safe to return to the caller: it never names keys, claims
/// values or subjects. The correlation id ties it to the audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationFailure {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Correlation ID for tracing
    pub correlation_id: Uuid,
}

impl AuthenticationFailure {
    /// Create a failure from an [`AuthEdgeError`]
    #[must_use]
    pub fn from_error(error: &AuthEdgeError, correlation_id: Uuid) -> Self {
        let message = match error {
            AuthEdgeError::TokenMissing => "Token is required".to_string(),
            AuthEdgeError::TokenMalformed { .. } => "Token is malformed".to_string(),
            AuthEdgeError::UnresolvedKey { .. } => "Token was signed by an unknown key".to_string(),
            AuthEdgeError::SignatureInvalid => "Token signature is invalid".to_string(),
            AuthEdgeError::ClaimsInvalid { claims } => {
                format!("Invalid claims: {}", claims.join(", "))
            }
            AuthEdgeError::TokenExpired { .. } => "Token has expired".to_string(),
            AuthEdgeError::TokenRevoked => "Token has been revoked".to_string(),
            AuthEdgeError::UnknownSubject { .. } | AuthEdgeError::AccountDisabled { .. } => {
                "Account is not allowed to authenticate".to_string()
            }
            AuthEdgeError::CollaboratorUnavailable { .. } => {
                "Authentication temporarily unavailable".to_string()
            }
        };

        Self {
            code: error.code(),
            message,
            correlation_id,
        }
    }
}

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [correlation_id: {}]",
            self.code, self.message, self.correlation_id
        )
    }
}

impl std::error::Error for AuthenticationFailure {}

impl AuthEdgeError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TokenMissing => ErrorCode::TokenMissing,
            Self::TokenMalformed { .. } => ErrorCode::TokenMalformed,
            Self::UnresolvedKey { .. } => ErrorCode::KeyUnresolved,
            Self::SignatureInvalid => ErrorCode::TokenInvalid,
            Self::ClaimsInvalid { .. } => ErrorCode::ClaimsInvalid,
            Self::TokenExpired { .. } => ErrorCode::TokenExpired,
            Self::TokenRevoked => ErrorCode::TokenRevoked,
            Self::UnknownSubject { .. } | Self::AccountDisabled { .. } => {
                ErrorCode::AccountRejected
            }
            Self::CollaboratorUnavailable { .. } => ErrorCode::ServiceUnavailable,
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CollaboratorUnavailable { .. })
    }

    /// Create a malformed token error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::TokenMalformed {
            reason: reason.into(),
        }
    }

    /// Create a claims error for a single claim.
    #[must_use]
    pub fn claim(name: &str) -> Self {
        Self::ClaimsInvalid {
            claims: vec![name.to_string()],
        }
    }

    /// Create a collaborator failure.
    #[must_use]
    pub fn collaborator(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthEdgeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired {
                expired_at: Utc::now(),
            },
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat => Self::SignatureInvalid,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::TokenMalformed {
                reason: err.to_string(),
            },
            ErrorKind::MissingRequiredClaim(claim) => Self::ClaimsInvalid {
                claims: vec![claim.clone()],
            },
            ErrorKind::InvalidIssuer => Self::claim("iss"),
            ErrorKind::InvalidAudience => Self::claim("aud"),
            ErrorKind::InvalidSubject => Self::claim("sub"),
            _ => Self::TokenMalformed {
                reason: "Token validation failed".to_string(),
            },
        }
    }
}
