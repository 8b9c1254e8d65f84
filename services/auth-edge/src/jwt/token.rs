//! Type-State JWT Token with compile-time validation guarantees
//!
//! Claims are only reachable once the signature has been verified, and the
//! typed accessors only exist on fully validated tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, Header, Validation};
use key_common::{KeyRecord, SigningAlgorithm};
use std::collections::BTreeSet;

use crate::error::AuthEdgeError;
use crate::jwt::claims::{Audience, Claims};

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Unvalidated token - just parsed, not verified
#[derive(Debug)]
pub struct Unvalidated;
impl private::Sealed for Unvalidated {}
impl TokenState for Unvalidated {
    fn state_name() -> &'static str {
        "Unvalidated"
    }
}

/// Signature validated - cryptographic verification passed
#[derive(Debug)]
pub struct SignatureValidated {
    claims: Claims,
}
impl private::Sealed for SignatureValidated {}
impl TokenState for SignatureValidated {
    fn state_name() -> &'static str {
        "SignatureValidated"
    }
}

/// Fully validated - signature + claims verified
#[derive(Debug)]
pub struct Validated {
    claims: Claims,
    validated_at: DateTime<Utc>,
}
impl private::Sealed for Validated {}
impl TokenState for Validated {
    fn state_name() -> &'static str {
        "Validated"
    }
}

/// Claim checks applied on top of signature verification.
///
/// Subject, audience and expiry are always checked. Everything set here is an
/// additional requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimRequirements {
    /// Exact subject
    pub subject: Option<String>,
    /// Audience that must be among the token's audiences
    pub audience: Option<String>,
    /// Exact issuer
    pub issuer: Option<String>,
    /// At least one of these authorities must be granted
    pub any_authority: Option<BTreeSet<String>>,
    /// Seconds of tolerance on the expiry check
    pub leeway_secs: u64,
}

impl ClaimRequirements {
    /// Presence and expiry checks only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an exact subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Require an audience.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Require an exact issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require at least one of `authorities`.
    #[must_use]
    pub fn any_authority<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.any_authority = Some(authorities.into_iter().map(Into::into).collect());
        self
    }

    /// Tolerate `secs` of clock skew on expiry.
    #[must_use]
    pub const fn leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }
}

/// Type-state token wrapper that enforces validation at compile time
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    header: Header,
    state: State,
}

impl Token<Unvalidated> {
    /// Parse a compact JWS without verifying it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::TokenMalformed`] if the token does not have
    /// three segments or the header does not decode.
    pub fn parse(raw: &str) -> Result<Self, AuthEdgeError> {
        let segments = raw.split('.').count();
        if segments != 3 {
            return Err(AuthEdgeError::malformed(format!(
                "expected 3 segments, found {segments}"
            )));
        }

        let header = decode_header(raw)
            .map_err(|e| AuthEdgeError::malformed(format!("Invalid header: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            state: Unvalidated,
        })
    }

    /// Verify the signature with `key` and decode the claims.
    ///
    /// The key's own algorithm is the only one accepted, whatever the header
    /// claims. No time-based check happens here.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::SignatureInvalid`] if the header algorithm
    /// differs from the key's or the signature does not verify, and
    /// [`AuthEdgeError::TokenMalformed`] if the claims do not decode.
    pub fn verify_signature(
        self,
        key: &KeyRecord,
    ) -> Result<Token<SignatureValidated>, AuthEdgeError> {
        let algorithm = key.algorithm();
        if SigningAlgorithm::from_jwt_algorithm(self.header.alg) != Some(algorithm) {
            return Err(AuthEdgeError::SignatureInvalid);
        }

        let decoding_key = key
            .decoding_key()
            .map_err(|_| AuthEdgeError::SignatureInvalid)?;

        let mut validation = Validation::new(algorithm.jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(&self.raw, &decoding_key, &validation)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: SignatureValidated {
                claims: token_data.claims,
            },
        })
    }
}

impl Token<SignatureValidated> {
    /// Claims whose signature has been verified but which are not yet checked.
    #[must_use]
    pub const fn peek_claims(&self) -> &Claims {
        &self.state.claims
    }

    /// Check claims at `now` and transition to fully validated state.
    ///
    /// The token is valid while `now` is strictly before its expiry plus the
    /// leeway.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::ClaimsInvalid`] listing every missing or
    /// mismatching claim, or [`AuthEdgeError::TokenExpired`].
    pub fn validate_claims(
        self,
        requirements: &ClaimRequirements,
        now: DateTime<Utc>,
    ) -> Result<Token<Validated>, AuthEdgeError> {
        let claims = &self.state.claims;
        let mut invalid = Vec::new();

        if claims.sub.trim().is_empty() {
            invalid.push("sub");
        }
        if !claims.aud.iter().any(|aud| !aud.trim().is_empty()) {
            invalid.push("aud");
        }
        let Some(exp) = claims.exp else {
            invalid.push("exp");
            return Err(claims_invalid(&invalid));
        };

        let leeway = i64::try_from(requirements.leeway_secs).unwrap_or(i64::MAX);
        if now.timestamp() >= exp.saturating_add(leeway) {
            return Err(AuthEdgeError::TokenExpired {
                expired_at: DateTime::from_timestamp(exp, 0).unwrap_or(now),
            });
        }

        if requirements
            .subject
            .as_ref()
            .is_some_and(|subject| claims.sub != *subject)
        {
            invalid.push("sub");
        }
        if requirements
            .audience
            .as_ref()
            .is_some_and(|audience| !claims.aud.contains(audience))
        {
            invalid.push("aud");
        }
        if requirements
            .issuer
            .as_ref()
            .is_some_and(|issuer| claims.iss != *issuer)
        {
            invalid.push("iss");
        }
        if requirements
            .any_authority
            .as_ref()
            .is_some_and(|required| !claims.grants_any(required.iter().map(String::as_str)))
        {
            invalid.push("authorities");
        }

        if !invalid.is_empty() {
            return Err(claims_invalid(&invalid));
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: Validated {
                claims: self.state.claims,
                validated_at: now,
            },
        })
    }
}

fn claims_invalid(names: &[&str]) -> AuthEdgeError {
    let mut claims: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !claims.iter().any(|claim| claim == name) {
            claims.push((*name).to_string());
        }
    }
    AuthEdgeError::ClaimsInvalid { claims }
}

impl Token<Validated> {
    /// Access claims - only available on fully validated tokens
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.state.claims
    }

    /// Get the subject claim
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.state.claims.sub
    }

    /// Get the issuer claim
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.state.claims.iss
    }

    /// Get the audience claim
    #[must_use]
    pub const fn audience(&self) -> &Audience {
        &self.state.claims.aud
    }

    /// Get the granted authorities
    #[must_use]
    pub const fn authorities(&self) -> &BTreeSet<String> {
        &self.state.claims.authorities
    }

    /// Get the expiration timestamp
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .claims
            .exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Instant the claims were checked against
    #[must_use]
    pub const fn validated_at(&self) -> DateTime<Utc> {
        self.state.validated_at
    }

    /// Take the claims
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.state.claims
    }
}

// Common methods for all states
impl<S: TokenState> Token<S> {
    /// Get the current state name
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }

    /// Get the key ID from the token header
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Get the algorithm from the token header
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Get the token header
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Get the raw token string
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}
