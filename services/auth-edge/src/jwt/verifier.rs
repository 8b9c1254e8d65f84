//! Token verification against resolved public keys.

use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use key_common::{Clock, KeyRecord, SystemClock};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::contracts::PublicKeyResolver;
use crate::error::AuthEdgeError;
use crate::jwt::claims::{Claims, Presence};
use crate::jwt::token::{ClaimRequirements, Token, Unvalidated, Validated};

/// Algorithm and key id from an unverified token header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signing algorithm
    pub algorithm: Algorithm,
    /// Declared key id
    pub kid: Option<String>,
}

/// Verifies bearer tokens.
///
/// Every check that depends on the time samples the clock once per call and
/// uses that instant throughout, including key expiry and revocation.
#[derive(Clone)]
pub struct TokenVerifier {
    resolver: Arc<dyn PublicKeyResolver>,
    clock: Arc<dyn Clock>,
    leeway_secs: u64,
    expected_issuer: Option<String>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("clock", &self.clock)
            .field("leeway_secs", &self.leeway_secs)
            .field("expected_issuer", &self.expected_issuer)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier resolving keys through `resolver`, with no clock
    /// skew tolerance and no issuer requirement.
    #[must_use]
    pub fn new(resolver: Arc<dyn PublicKeyResolver>) -> Self {
        Self {
            resolver,
            clock: Arc::new(SystemClock),
            leeway_secs: 0,
            expected_issuer: None,
        }
    }

    /// Create a verifier with the configured skew and expected issuer.
    #[must_use]
    pub fn from_config(resolver: Arc<dyn PublicKeyResolver>, config: &Config) -> Self {
        let verifier = Self::new(resolver).with_leeway(config.clock_skew_seconds);
        match &config.expected_issuer {
            Some(issuer) => verifier.with_expected_issuer(issuer),
            None => verifier,
        }
    }

    /// Use a custom clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tolerate `secs` of clock skew on expiry.
    #[must_use]
    pub const fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Require this `iss` on every token.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Read the algorithm and key id without verifying anything.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::TokenMalformed`] if the token is not a
    /// three-part JWS or its header does not decode.
    pub fn parse_header(&self, token: &str) -> Result<TokenHeader, AuthEdgeError> {
        let token = Token::parse(token)?;
        Ok(TokenHeader {
            algorithm: token.algorithm(),
            kid: token.kid().map(str::to_string),
        })
    }

    /// Resolve the public key for `kid`.
    ///
    /// A key that is revoked or expired counts as unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::UnresolvedKey`] if no usable record exists.
    pub fn resolve_public_key(&self, kid: &str) -> Result<KeyRecord, AuthEdgeError> {
        self.resolve_at(kid, self.clock.now())
    }

    fn resolve_at(&self, kid: &str, now: DateTime<Utc>) -> Result<KeyRecord, AuthEdgeError> {
        match self.resolver.resolve(kid) {
            Some(record) if record.is_usable_at(now) => Ok(record),
            Some(record) => {
                debug!(
                    kid = %kid,
                    revoked_at = ?record.revoked_at(),
                    expires_at = ?record.expires_at(),
                    "Resolved key is no longer usable"
                );
                Err(AuthEdgeError::UnresolvedKey {
                    kid: kid.to_string(),
                })
            }
            None => {
                debug!(kid = %kid, "No public key for kid");
                Err(AuthEdgeError::UnresolvedKey {
                    kid: kid.to_string(),
                })
            }
        }
    }

    /// Verify the signature with `key` and select a value from the claims.
    ///
    /// Only the signature is checked; an expired token still yields claims.
    /// Empty strings, collections and maps come back as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::TokenMalformed`] or
    /// [`AuthEdgeError::SignatureInvalid`].
    pub fn extract_claim<T, F>(
        &self,
        token: &str,
        key: &KeyRecord,
        selector: F,
    ) -> Result<Option<T>, AuthEdgeError>
    where
        T: Presence,
        F: FnOnce(&Claims) -> Option<T>,
    {
        let token = Token::parse(token)?.verify_signature(key)?;
        Ok(selector(token.peek_claims()).filter(Presence::is_present))
    }

    /// Authorities granted by the token, empty if it grants none.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::TokenMalformed`] or
    /// [`AuthEdgeError::SignatureInvalid`].
    pub fn extract_authorities(
        &self,
        token: &str,
        key: &KeyRecord,
    ) -> Result<BTreeSet<String>, AuthEdgeError> {
        Ok(self
            .extract_claim(token, key, |claims| Some(claims.authorities.clone()))?
            .unwrap_or_default())
    }

    /// Fully validate `token` against `key`: signature, subject and audience
    /// present, expiry in the future, and the expected issuer if configured.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(
        &self,
        token: &str,
        key: &KeyRecord,
    ) -> Result<Token<Validated>, AuthEdgeError> {
        self.validate_with(token, key, ClaimRequirements::new())
    }

    /// [`Self::validate`] plus additional requirements.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate_with(
        &self,
        token: &str,
        key: &KeyRecord,
        requirements: ClaimRequirements,
    ) -> Result<Token<Validated>, AuthEdgeError> {
        let now = self.clock.now();
        self.validate_at(Token::parse(token)?, key, requirements, now)
    }

    fn validate_at(
        &self,
        token: Token<Unvalidated>,
        key: &KeyRecord,
        mut requirements: ClaimRequirements,
        now: DateTime<Utc>,
    ) -> Result<Token<Validated>, AuthEdgeError> {
        if requirements.issuer.is_none() {
            requirements.issuer.clone_from(&self.expected_issuer);
        }
        requirements.leeway_secs = requirements.leeway_secs.max(self.leeway_secs);

        token.verify_signature(key)?.validate_claims(&requirements, now)
    }

    /// Whether `token` passes [`Self::validate`].
    #[must_use]
    pub fn is_valid(&self, token: &str, key: &KeyRecord) -> bool {
        self.validate(token, key).is_ok()
    }

    /// Whether `token` is valid for exactly this subject and audience.
    #[must_use]
    pub fn is_valid_for(
        &self,
        token: &str,
        key: &KeyRecord,
        subject: &str,
        audience: &str,
    ) -> bool {
        self.validate_with(
            token,
            key,
            ClaimRequirements::new().subject(subject).audience(audience),
        )
        .is_ok()
    }

    /// Whether `token` is valid for this subject and audience and grants at
    /// least one of `required`.
    ///
    /// An empty `required` set never authorizes.
    #[must_use]
    pub fn is_authorized(
        &self,
        token: &str,
        key: &KeyRecord,
        subject: &str,
        audience: &str,
        required: &BTreeSet<String>,
    ) -> bool {
        self.validate_with(
            token,
            key,
            ClaimRequirements::new()
                .subject(subject)
                .audience(audience)
                .any_authority(required.iter().cloned()),
        )
        .is_ok()
    }

    /// Parse, resolve the key named in the header and validate.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::TokenMalformed`] (including a missing key id),
    /// [`AuthEdgeError::UnresolvedKey`], [`AuthEdgeError::SignatureInvalid`],
    /// [`AuthEdgeError::ClaimsInvalid`] or [`AuthEdgeError::TokenExpired`].
    pub fn verify(&self, token: &str) -> Result<Token<Validated>, AuthEdgeError> {
        self.verify_with(token, ClaimRequirements::new())
    }

    /// [`Self::verify`] plus additional requirements.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_with(
        &self,
        token: &str,
        requirements: ClaimRequirements,
    ) -> Result<Token<Validated>, AuthEdgeError> {
        let now = self.clock.now();
        let token = Token::parse(token)?;
        let kid = token
            .kid()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| AuthEdgeError::malformed("missing kid in header"))?;
        let key = self.resolve_at(kid, now)?;

        self.validate_at(token, &key, requirements, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;
    use test_utils::fixtures::{fresh_claims, sample_claims, TestSigningKey};
    use test_utils::mocks::ManualClock;

    fn verifier_for(key: &TestSigningKey) -> TokenVerifier {
        let record = key.record().clone();
        TokenVerifier::new(Arc::new(move |kid: &str| (kid == record.kid()).then(|| record.clone())))
    }

    #[test]
    fn test_parse_header() {
        let key = TestSigningKey::es256("k1");
        let token = key.sign(&fresh_claims("user-1", "orders-api"));
        let verifier = verifier_for(&key);

        let header = verifier.parse_header(&token).unwrap();
        assert_eq!(header.algorithm, Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some("k1"));

        assert!(matches!(
            verifier.parse_header("not-a-token"),
            Err(AuthEdgeError::TokenMalformed { .. })
        ));
    }

    #[test]
    fn test_resolve_unknown_kid() {
        let key = TestSigningKey::es256("k1");
        let verifier = verifier_for(&key);

        assert!(verifier.resolve_public_key("k1").is_ok());
        assert!(matches!(
            verifier.resolve_public_key("k2"),
            Err(AuthEdgeError::UnresolvedKey { kid }) if kid == "k2"
        ));
    }

    #[test]
    fn test_revoked_and_expired_keys_are_unresolved() {
        let clock = ManualClock::starting_now();
        let now = clock.now();
        let key = TestSigningKey::es256("k1");
        let revoked = key.record().clone().with_revocation(now - Duration::minutes(1));
        let expiring = key.record().clone().with_expiry(now + Duration::minutes(1));

        let verifier = TokenVerifier::new(Arc::new(move |_: &str| Some(revoked.clone())))
            .with_clock(Arc::new(clock.clone()));
        assert!(verifier.resolve_public_key("k1").is_err());

        let verifier = TokenVerifier::new(Arc::new(move |_: &str| Some(expiring.clone())))
            .with_clock(Arc::new(clock.clone()));
        assert!(verifier.resolve_public_key("k1").is_ok());
        clock.advance(Duration::minutes(1));
        assert!(verifier.resolve_public_key("k1").is_err());
    }

    #[test]
    fn test_extract_claim_treats_empty_as_absent() {
        let key = TestSigningKey::es256("k1");
        let now = Utc::now().timestamp();
        let mut claims = sample_claims("user-1", "orders-api", now, now + 60);
        claims["tenant"] = Value::String(String::new());
        claims["region"] = Value::String("eu".to_string());
        let token = key.sign(&claims);
        let verifier = verifier_for(&key);

        let subject = verifier
            .extract_claim(&token, key.record(), |c| Some(c.sub.clone()))
            .unwrap();
        assert_eq!(subject.as_deref(), Some("user-1"));

        let tenant = verifier
            .extract_claim(&token, key.record(), |c| c.custom.get("tenant").cloned())
            .unwrap();
        assert!(tenant.is_none());

        let region = verifier
            .extract_claim(&token, key.record(), |c| c.custom.get("region").cloned())
            .unwrap();
        assert_eq!(region, Some(Value::String("eu".to_string())));
    }

    #[test]
    fn test_extract_claim_checks_signature() {
        let key = TestSigningKey::es256("k1");
        let impostor = TestSigningKey::es256("k1");
        let token = impostor.sign(&fresh_claims("user-1", "orders-api"));

        let result =
            verifier_for(&key).extract_claim(&token, key.record(), |c| Some(c.sub.clone()));
        assert!(matches!(result, Err(AuthEdgeError::SignatureInvalid)));
    }

    #[test]
    fn test_extract_authorities() {
        let key = TestSigningKey::es256("k1");
        let verifier = verifier_for(&key);

        let token = key.sign(&fresh_claims("user-1", "orders-api"));
        let authorities = verifier.extract_authorities(&token, key.record()).unwrap();
        assert_eq!(authorities, BTreeSet::from(["ROLE_USER".to_string()]));

        let bare = key.sign(&serde_json::json!({"sub": "user-1"}));
        assert!(verifier.extract_authorities(&bare, key.record()).unwrap().is_empty());
    }

    #[test]
    fn test_validity_overloads() {
        let key = TestSigningKey::es256("k1");
        let token = key.sign(&fresh_claims("user-1", "orders-api"));
        let verifier = verifier_for(&key);
        let record = key.record();
        let required =
            |names: &[&str]| names.iter().map(|n| (*n).to_string()).collect::<BTreeSet<_>>();

        assert!(verifier.is_valid(&token, record));
        assert!(verifier.is_valid_for(&token, record, "user-1", "orders-api"));
        assert!(!verifier.is_valid_for(&token, record, "user-2", "orders-api"));
        assert!(!verifier.is_valid_for(&token, record, "user-1", "billing-api"));
        let authorized = |names: &[&str]| {
            verifier.is_authorized(&token, record, "user-1", "orders-api", &required(names))
        };
        assert!(authorized(&["ROLE_USER"]));
        assert!(!authorized(&["ROLE_ADMIN"]));
        assert!(!authorized(&[]));
    }

    #[test]
    fn test_expiry_uses_injected_clock() {
        let clock = ManualClock::starting_now();
        let key = TestSigningKey::es256("k1");
        let iat = clock.now().timestamp();
        let token = key.sign(&sample_claims("user-1", "orders-api", iat, iat + 60));
        let verifier = verifier_for(&key).with_clock(Arc::new(clock.clone()));

        assert!(verifier.verify(&token).is_ok());

        clock.set(DateTime::from_timestamp(iat + 60, 0).unwrap());
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthEdgeError::TokenExpired { .. })
        ));

        let tolerant = verifier.clone().with_leeway(30);
        assert!(tolerant.verify(&token).is_ok());
    }

    #[test]
    fn test_expected_issuer() {
        let key = TestSigningKey::es256("k1");
        let token = key.sign(&fresh_claims("user-1", "orders-api"));

        let verifier = verifier_for(&key).with_expected_issuer("https://auth.example.com");
        assert!(verifier.verify(&token).is_ok());

        let verifier = verifier_for(&key).with_expected_issuer("https://other.example.com");
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthEdgeError::ClaimsInvalid { claims }) if claims == ["iss"]
        ));
    }

    #[test]
    fn test_verify_requires_kid() {
        let key = TestSigningKey::es256("k1");
        let header = jsonwebtoken::Header::new(Algorithm::ES256);
        let token = key.sign_with_header(&header, &fresh_claims("user-1", "orders-api"));

        assert!(matches!(
            verifier_for(&key).verify(&token),
            Err(AuthEdgeError::TokenMalformed { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let key = TestSigningKey::es256("k1");
        let record = key.record().clone();
        let config = Config {
            clock_skew_seconds: 45,
            expected_issuer: Some("https://auth.example.com".to_string()),
            ..Config::default()
        };

        let verifier =
            TokenVerifier::from_config(Arc::new(move |_: &str| Some(record.clone())), &config);
        assert_eq!(verifier.leeway_secs, 45);
        assert_eq!(verifier.expected_issuer.as_deref(), Some("https://auth.example.com"));
    }
}
