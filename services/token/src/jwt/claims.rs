//! Issued token claims.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Claim names the issuer sets itself; custom claims may not use them.
pub const RESERVED_CLAIMS: &[&str] = &[
    "iss",
    "sub",
    "aud",
    "iat",
    "exp",
    "nbf",
    "jti",
    "token_type",
    "authorities",
];

/// Body of an issued token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Token type tag, e.g. `access`
    pub token_type: String,
    /// Granted authorities
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub authorities: BTreeSet<String>,
    /// Caller-supplied claims
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    /// Whether the token is unexpired at `timestamp` (seconds since the epoch).
    #[must_use]
    pub const fn is_valid_at(&self, timestamp: i64) -> bool {
        timestamp < self.exp
    }

    /// Lifetime in seconds.
    #[must_use]
    pub const fn lifetime_secs(&self) -> i64 {
        self.exp - self.iat
    }
}
