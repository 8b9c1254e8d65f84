//! Public key metadata shared by the issuer and every verifier.
//!
//! A [`KeyRecord`] is the only shape in which key material crosses a process
//! boundary. It never carries private material.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

/// Minimum key strength, in RSA-equivalent bits.
pub const MIN_KEY_SIZE_BITS: usize = 2048;

/// Key family of a signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// RSA keys (PKCS#1 v1.5 and PSS signatures)
    Rsa,
    /// ECDSA keys over NIST curves
    Ec,
}

impl KeyFamily {
    /// Get the family name carried in rotation events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
        }
    }
}

impl FromStr for KeyFamily {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RSA" => Ok(Self::Rsa),
            "EC" | "ECDSA" => Ok(Self::Ec),
            _ => Err(KeyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asymmetric JWS algorithm a key is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256
    RS256,
    /// RSA PKCS#1 v1.5 with SHA-384
    RS384,
    /// RSA PKCS#1 v1.5 with SHA-512
    RS512,
    /// RSA-PSS with SHA-256
    PS256,
    /// RSA-PSS with SHA-384
    PS384,
    /// RSA-PSS with SHA-512
    PS512,
    /// ECDSA with P-256 and SHA-256
    ES256,
    /// ECDSA with P-384 and SHA-384
    ES384,
}

impl SigningAlgorithm {
    /// Get algorithm name for JWT header.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// Key family this algorithm signs with.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        match self {
            Self::ES256 | Self::ES384 => KeyFamily::Ec,
            _ => KeyFamily::Rsa,
        }
    }

    /// The matching `jsonwebtoken` algorithm.
    #[must_use]
    pub const fn jwt_algorithm(&self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS384 => Algorithm::PS384,
            Self::PS512 => Algorithm::PS512,
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Map a header algorithm back to a supported signing algorithm.
    ///
    /// Symmetric algorithms have no counterpart and yield `None`.
    #[must_use]
    pub const fn from_jwt_algorithm(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256 => Some(Self::RS256),
            Algorithm::RS384 => Some(Self::RS384),
            Algorithm::RS512 => Some(Self::RS512),
            Algorithm::PS256 => Some(Self::PS256),
            Algorithm::PS384 => Some(Self::PS384),
            Algorithm::PS512 => Some(Self::PS512),
            Algorithm::ES256 => Some(Self::ES256),
            Algorithm::ES384 => Some(Self::ES384),
            _ => None,
        }
    }

    /// Length of the SEC1 uncompressed point for EC algorithms.
    const fn ec_point_len(&self) -> Option<usize> {
        match self {
            Self::ES256 => Some(65),
            Self::ES384 => Some(97),
            _ => None,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS384" => Ok(Self::PS384),
            "PS512" => Ok(Self::PS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            _ => Err(KeyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public key metadata.
///
/// The encoded public key is base64 (standard alphabet) of the
/// verification-native DER form: PKCS#1 `RSAPublicKey` for RSA keys and the
/// SEC1 uncompressed point for EC keys.
///
/// Records are immutable once built; the `with_*` methods consume the record
/// and are meant for construction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    kid: String,
    encoded_public_key: String,
    algorithm: SigningAlgorithm,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Build a record from raw public key bytes.
    #[must_use]
    pub fn new(
        kid: impl Into<String>,
        public_key_der: &[u8],
        algorithm: SigningAlgorithm,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::from_encoded(kid, STANDARD.encode(public_key_der), algorithm, created_at)
    }

    /// Build a record from an already base64-encoded public key.
    #[must_use]
    pub fn from_encoded(
        kid: impl Into<String>,
        encoded_public_key: impl Into<String>,
        algorithm: SigningAlgorithm,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kid: kid.into(),
            encoded_public_key: encoded_public_key.into(),
            algorithm,
            created_at,
            expires_at: None,
            revoked_at: None,
        }
    }

    /// Set the expiry timestamp.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the revocation timestamp.
    #[must_use]
    pub fn with_revocation(mut self, revoked_at: DateTime<Utc>) -> Self {
        self.revoked_at = Some(revoked_at);
        self
    }

    /// Key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Base64-encoded public key.
    #[must_use]
    pub fn encoded_public_key(&self) -> &str {
        &self.encoded_public_key
    }

    /// Signing algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry timestamp, if any.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Revocation timestamp, if any.
    #[must_use]
    pub const fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Whether the key may verify signatures at `now`.
    ///
    /// A key stops being usable at the instant it is revoked or expires.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        let revoked = self.revoked_at.is_some_and(|at| at <= now);
        let expired = self.expires_at.is_some_and(|at| at <= now);
        !revoked && !expired
    }

    /// Decode the public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyMaterial`] if the encoding is not valid base64.
    pub fn public_key_der(&self) -> Result<Vec<u8>, KeyError> {
        STANDARD
            .decode(&self.encoded_public_key)
            .map_err(|e| KeyError::invalid_material(&self.kid, e.to_string()))
    }

    /// Check the key meets the minimum strength for its algorithm.
    ///
    /// RSA moduli must be at least [`MIN_KEY_SIZE_BITS`]; EC keys must be a
    /// well-formed uncompressed point on the declared curve, which is always
    /// above the floor.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::WeakKey`] or [`KeyError::InvalidKeyMaterial`].
    pub fn validate_strength(&self) -> Result<(), KeyError> {
        let der = self.public_key_der()?;

        match self.algorithm.family() {
            KeyFamily::Rsa => {
                let key = RsaPublicKey::from_pkcs1_der(&der)
                    .map_err(|e| KeyError::invalid_material(&self.kid, e.to_string()))?;
                let bits = key.size() * 8;
                if bits < MIN_KEY_SIZE_BITS {
                    return Err(KeyError::WeakKey {
                        kid: self.kid.clone(),
                        bits,
                        minimum: MIN_KEY_SIZE_BITS,
                    });
                }
            }
            KeyFamily::Ec => {
                let expected = self.algorithm.ec_point_len().unwrap_or_default();
                if der.len() != expected || der.first() != Some(&0x04) {
                    return Err(KeyError::invalid_material(
                        &self.kid,
                        format!("expected a {expected}-byte uncompressed point"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Build the verification key for this record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyMaterial`] if the encoding is not valid base64.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeyError> {
        let der = self.public_key_der()?;
        Ok(match self.algorithm.family() {
            KeyFamily::Rsa => DecodingKey::from_rsa_der(&der),
            KeyFamily::Ec => DecodingKey::from_ec_der(&der),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rsa::pkcs1::EncodeRsaPublicKey;

    fn rsa_record(bits: usize) -> KeyRecord {
        let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), bits).unwrap();
        let der = private.to_public_key().to_pkcs1_der().unwrap();
        KeyRecord::new("rsa-key", der.as_bytes(), SigningAlgorithm::RS256, Utc::now())
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("RS256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::RS256);
        assert_eq!("ps384".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::PS384);
        assert_eq!("ES256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::ES256);
        assert!("HS256".parse::<SigningAlgorithm>().is_err());
        assert!("none".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_algorithm_family() {
        assert_eq!(SigningAlgorithm::RS512.family(), KeyFamily::Rsa);
        assert_eq!(SigningAlgorithm::PS256.family(), KeyFamily::Rsa);
        assert_eq!(SigningAlgorithm::ES384.family(), KeyFamily::Ec);
        assert_eq!("rsa".parse::<KeyFamily>().unwrap(), KeyFamily::Rsa);
        assert!("DSA".parse::<KeyFamily>().is_err());
    }

    #[test]
    fn test_jwt_algorithm_round_trip() {
        for alg in [
            SigningAlgorithm::RS256,
            SigningAlgorithm::PS512,
            SigningAlgorithm::ES256,
        ] {
            assert_eq!(SigningAlgorithm::from_jwt_algorithm(alg.jwt_algorithm()), Some(alg));
        }
        assert_eq!(SigningAlgorithm::from_jwt_algorithm(Algorithm::HS256), None);
    }

    #[test]
    fn test_usable_window() {
        let now = Utc::now();
        let record = KeyRecord::new("k", b"\x04", SigningAlgorithm::ES256, now);
        assert!(record.is_usable_at(now));

        let expired = record.clone().with_expiry(now);
        assert!(!expired.is_usable_at(now));
        assert!(expired.is_usable_at(now - Duration::seconds(1)));

        let revoked = record.with_revocation(now - Duration::minutes(5));
        assert!(!revoked.is_usable_at(now));
    }

    #[test]
    fn test_rsa_strength_accepts_2048() {
        assert!(rsa_record(2048).validate_strength().is_ok());
    }

    #[test]
    fn test_rsa_strength_rejects_1024() {
        let err = rsa_record(1024).validate_strength().unwrap_err();
        assert!(matches!(err, KeyError::WeakKey { bits: 1024, .. }));
    }

    #[test]
    fn test_ec_strength_checks_point_shape() {
        let mut point = vec![0x04u8];
        point.extend_from_slice(&[7u8; 64]);
        let ok = KeyRecord::new("ec", &point, SigningAlgorithm::ES256, Utc::now());
        assert!(ok.validate_strength().is_ok());

        let wrong_curve = KeyRecord::new("ec", &point, SigningAlgorithm::ES384, Utc::now());
        assert!(wrong_curve.validate_strength().is_err());

        let compressed = KeyRecord::new("ec", &[0x02u8; 33], SigningAlgorithm::ES256, Utc::now());
        assert!(compressed.validate_strength().is_err());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let record =
            KeyRecord::from_encoded("k", "not base64!", SigningAlgorithm::RS256, Utc::now());
        assert!(matches!(
            record.public_key_der(),
            Err(KeyError::InvalidKeyMaterial { .. })
        ));
        assert!(record.decoding_key().is_err());
    }

    #[test]
    fn test_serde_round_trip_skips_empty_timestamps() {
        let record = KeyRecord::new("k1", b"abc", SigningAlgorithm::ES256, Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("expires_at"));
        assert!(!json.contains("revoked_at"));
        let back: KeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
