//! Token issuance with the manager's active key.

use chrono::{DateTime, Duration, Utc};
use key_common::{Clock, SystemClock};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::TokenError;
use crate::jwt::builder::TokenRequest;
use crate::jwt::claims::Claims;
use crate::signing::SigningKeyManager;

/// A signed token and what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    /// Compact serialization
    pub token: String,
    /// Key id in the header
    pub kid: String,
    /// Signed claims
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or_default()
    }
}

/// Builds and signs tokens.
#[derive(Debug)]
pub struct TokenIssuer {
    manager: Arc<SigningKeyManager>,
    issuer: String,
    default_audience: String,
    default_validity_minutes: i64,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Create an issuer.
    #[must_use]
    pub fn new(
        manager: Arc<SigningKeyManager>,
        issuer: impl Into<String>,
        default_audience: impl Into<String>,
        default_validity_minutes: i64,
    ) -> Self {
        Self {
            manager,
            issuer: issuer.into(),
            default_audience: default_audience.into(),
            default_validity_minutes,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an issuer from service configuration.
    #[must_use]
    pub fn from_config(manager: Arc<SigningKeyManager>, config: &Config) -> Self {
        Self::new(
            manager,
            &config.jwt_issuer,
            &config.default_audience,
            config.token_validity_minutes,
        )
    }

    /// Use a custom clock for issued-at.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a token.
    ///
    /// Issued-at is now, expiry is issued-at plus the validity, and the header
    /// carries the active key's algorithm and id.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::KeyInitialization`] if no key has been generated,
    /// [`TokenError::InvalidRequest`] or [`TokenError::InvalidHeader`] for a
    /// bad request, and [`TokenError::JwtEncoding`] if signing fails.
    pub fn issue(&self, request: TokenRequest) -> Result<IssuedToken, TokenError> {
        request.validate()?;
        let header = request.build_header()?;

        let validity = request.validity_minutes.unwrap_or(self.default_validity_minutes);
        if validity <= 0 {
            return Err(TokenError::InvalidRequest(format!(
                "validity must be positive, got {validity} minutes"
            )));
        }

        let signing_key = self.manager.active_signing_key()?;

        let issued_at = self.clock.now();
        let expires_at = Duration::try_minutes(validity)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                TokenError::InvalidRequest(format!(
                    "validity of {validity} minutes is out of range"
                ))
            })?;
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: request.subject,
            aud: request
                .audience
                .filter(|aud| !aud.is_empty())
                .unwrap_or_else(|| self.default_audience.clone()),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type: request.token_type,
            authorities: request.authorities,
            custom: request.claims,
        };

        let token = signing_key.sign(header, &claims)?;
        debug!(
            kid = %signing_key.kid(),
            sub = %claims.sub,
            token_type = %claims.token_type,
            exp = claims.exp,
            "Token issued"
        );

        Ok(IssuedToken {
            token,
            kid: signing_key.kid().to_string(),
            claims,
        })
    }
}
