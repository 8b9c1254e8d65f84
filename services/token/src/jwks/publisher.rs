//! JWKS document built from retained public keys.
//!
//! The set carries the same key material as rotation events, for consumers
//! that look keys up on demand instead of listening for events.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use key_common::{KeyError, KeyFamily, KeyRecord, SigningAlgorithm};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::signing::SigningKeyManager;

/// A single JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, `RSA` or `EC`
    pub kty: String,
    /// Key id
    pub kid: String,
    /// Intended use, always `sig`
    #[serde(rename = "use")]
    pub key_use: String,
    /// JWS algorithm
    pub alg: String,
    /// RSA modulus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC x coordinate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// EC curve name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
}

impl Jwk {
    /// Convert a key record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyMaterial`] if the encoded key does not
    /// decode for the record's algorithm.
    pub fn from_record(record: &KeyRecord) -> Result<Self, KeyError> {
        let der = record.public_key_der()?;
        let algorithm = record.algorithm();
        let mut jwk = Self {
            kty: algorithm.family().as_str().to_string(),
            kid: record.kid().to_string(),
            key_use: "sig".to_string(),
            alg: algorithm.as_str().to_string(),
            n: None,
            e: None,
            x: None,
            y: None,
            crv: None,
        };

        match algorithm.family() {
            KeyFamily::Rsa => {
                let key = RsaPublicKey::from_pkcs1_der(&der)
                    .map_err(|e| KeyError::invalid_material(record.kid(), e.to_string()))?;
                jwk.n = Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()));
                jwk.e = Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()));
            }
            KeyFamily::Ec => {
                record.validate_strength()?;
                let coordinates = &der[1..];
                let (x, y) = coordinates.split_at(coordinates.len() / 2);
                jwk.x = Some(URL_SAFE_NO_PAD.encode(x));
                jwk.y = Some(URL_SAFE_NO_PAD.encode(y));
                jwk.crv = Some(
                    match algorithm {
                        SigningAlgorithm::ES384 => "P-384",
                        _ => "P-256",
                    }
                    .to_string(),
                );
            }
        }

        Ok(jwk)
    }
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Keys, newest first
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Project records into a key set, skipping records that do not convert.
    #[must_use]
    pub fn from_records(records: &[KeyRecord]) -> Self {
        let keys = records
            .iter()
            .filter_map(|record| match Jwk::from_record(record) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    warn!(kid = %record.kid(), error = %e, "Skipping key in JWKS");
                    None
                }
            })
            .collect();
        Self { keys }
    }

    /// Look up a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Serves the manager's key history as a JWKS document.
#[derive(Debug, Clone)]
pub struct JwksPublisher {
    manager: Arc<SigningKeyManager>,
}

impl JwksPublisher {
    /// Create a publisher over `manager`'s history.
    #[must_use]
    pub const fn new(manager: Arc<SigningKeyManager>) -> Self {
        Self { manager }
    }

    /// Current key set, newest first.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks::from_records(&self.manager.key_history())
    }

    /// Key id of the active signing key, if any.
    #[must_use]
    pub fn current_key_id(&self) -> Option<String> {
        self.manager
            .active_public_key()
            .ok()
            .map(|record| record.kid().to_string())
    }
}
