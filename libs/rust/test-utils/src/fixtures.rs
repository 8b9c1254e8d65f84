//! Test fixtures with sample data.
//!
//! [`TestSigningKey`] produces real ES256 signatures so verifier tests do not
//! need the token service.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use key_common::{KeyRecord, SigningAlgorithm};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::Serialize;
use serde_json::{json, Value};

/// An ES256 key pair with its public record.
pub struct TestSigningKey {
    record: KeyRecord,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for TestSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSigningKey")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl TestSigningKey {
    /// Generate a fresh P-256 key created now.
    ///
    /// # Panics
    ///
    /// Panics if the system RNG is unavailable.
    #[must_use]
    pub fn es256(kid: &str) -> Self {
        Self::es256_created_at(kid, Utc::now())
    }

    /// Generate a fresh P-256 key with a fixed creation time.
    ///
    /// # Panics
    ///
    /// Panics if the system RNG is unavailable.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn es256_created_at(kid: &str, created_at: DateTime<Utc>) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .expect("generate P-256 key");
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
            .expect("parse generated P-256 key");

        Self {
            record: KeyRecord::new(
                kid,
                pair.public_key().as_ref(),
                SigningAlgorithm::ES256,
                created_at,
            ),
            encoding_key: EncodingKey::from_ec_der(pkcs8.as_ref()),
        }
    }

    /// Public record for this key.
    #[must_use]
    pub const fn record(&self) -> &KeyRecord {
        &self.record
    }

    /// Key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        self.record.kid()
    }

    /// Sign `claims` with this key, putting the key id in the header.
    ///
    /// # Panics
    ///
    /// Panics if the claims cannot be serialized.
    #[must_use]
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        let mut header = Header::new(jsonwebtoken::Algorithm::ES256);
        header.kid = Some(self.kid().to_string());
        self.sign_with_header(&header, claims)
    }

    /// Sign with an explicit header.
    ///
    /// # Panics
    ///
    /// Panics if the claims cannot be serialized.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn sign_with_header<T: Serialize>(&self, header: &Header, claims: &T) -> String {
        encode(header, claims, &self.encoding_key).expect("sign test token")
    }
}

/// Claim set accepted by a verifier expecting `subject` and `audience`.
#[must_use]
pub fn sample_claims(subject: &str, audience: &str, issued_at: i64, expires_at: i64) -> Value {
    json!({
        "iss": "https://auth.example.com",
        "sub": subject,
        "aud": audience,
        "iat": issued_at,
        "exp": expires_at,
        "token_type": "access",
        "authorities": ["ROLE_USER"],
    })
}

/// Claim set valid for the next hour.
#[must_use]
pub fn fresh_claims(subject: &str, audience: &str) -> Value {
    let now = Utc::now().timestamp();
    sample_claims(subject, audience, now, now + 3600)
}
