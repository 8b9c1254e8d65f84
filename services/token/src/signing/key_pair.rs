//! Asymmetric key pair generation.
//!
//! RSA keys come from the `rsa` crate and are handed to `jsonwebtoken` as
//! PKCS#1 DER. EC keys come from `ring` as PKCS#8. Private key bytes are held
//! in zeroizing buffers until `jsonwebtoken` has taken its own copy.

use chrono::{DateTime, Utc};
use jsonwebtoken::EncodingKey;
use key_common::{KeyFamily, KeyRecord, SigningAlgorithm, MIN_KEY_SIZE_BITS};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
    ECDSA_P384_SHA384_FIXED_SIGNING,
};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::RsaPrivateKey;
use std::fmt;
use zeroize::Zeroizing;

use crate::config::{KeySpec, MAX_KEY_SIZE_BITS};
use crate::error::TokenError;

/// A freshly generated key pair: public record plus private signing key.
///
/// The private key is only reachable through [`ActiveKeyPair::encoding_key`],
/// which is crate-private.
pub struct ActiveKeyPair {
    record: KeyRecord,
    encoding_key: EncodingKey,
}

impl ActiveKeyPair {
    /// Public half of the pair.
    #[must_use]
    pub const fn record(&self) -> &KeyRecord {
        &self.record
    }

    pub(crate) const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

impl fmt::Debug for ActiveKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveKeyPair")
            .field("kid", &self.record.kid())
            .field("algorithm", &self.record.algorithm())
            .finish_non_exhaustive()
    }
}

/// Generate a key pair for `spec`, stamped with `created_at`.
///
/// # Errors
///
/// Returns [`TokenError::KeyInitialization`] when the requested size is
/// outside the supported range or the underlying generator fails.
pub fn generate(spec: &KeySpec, created_at: DateTime<Utc>) -> Result<ActiveKeyPair, TokenError> {
    if spec.key_size_bits < MIN_KEY_SIZE_BITS {
        return Err(TokenError::key_init(format!(
            "key size {} is below the {MIN_KEY_SIZE_BITS}-bit minimum",
            spec.key_size_bits
        )));
    }

    let kid = spec.kid_strategy.generate();
    let pair = match spec.algorithm.family() {
        KeyFamily::Rsa => generate_rsa(&kid, spec, created_at)?,
        KeyFamily::Ec => generate_ec(&kid, spec.algorithm, created_at)?,
    };

    pair.record
        .validate_strength()
        .map_err(|e| TokenError::key_init(e.to_string()))?;

    Ok(pair)
}

fn generate_rsa(
    kid: &str,
    spec: &KeySpec,
    created_at: DateTime<Utc>,
) -> Result<ActiveKeyPair, TokenError> {
    if spec.key_size_bits > MAX_KEY_SIZE_BITS {
        return Err(TokenError::key_init(format!(
            "key size {} exceeds the {MAX_KEY_SIZE_BITS}-bit maximum",
            spec.key_size_bits
        )));
    }

    let private = RsaPrivateKey::new(&mut rand::thread_rng(), spec.key_size_bits)
        .map_err(|e| TokenError::key_init(format!("RSA key generation failed: {e}")))?;
    let private_der = private
        .to_pkcs1_der()
        .map_err(|e| TokenError::key_init(format!("RSA private key encoding failed: {e}")))?;
    let public_der = private
        .to_public_key()
        .to_pkcs1_der()
        .map_err(|e| TokenError::key_init(format!("RSA public key encoding failed: {e}")))?;

    Ok(ActiveKeyPair {
        record: KeyRecord::new(kid, public_der.as_bytes(), spec.algorithm, created_at),
        encoding_key: EncodingKey::from_rsa_der(private_der.as_bytes()),
    })
}

fn generate_ec(
    kid: &str,
    algorithm: SigningAlgorithm,
    created_at: DateTime<Utc>,
) -> Result<ActiveKeyPair, TokenError> {
    let curve: &'static EcdsaSigningAlgorithm = match algorithm {
        SigningAlgorithm::ES384 => &ECDSA_P384_SHA384_FIXED_SIGNING,
        _ => &ECDSA_P256_SHA256_FIXED_SIGNING,
    };

    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(curve, &rng)
        .map_err(|_| TokenError::key_init("EC key generation failed"))?;
    let pkcs8 = Zeroizing::new(pkcs8.as_ref().to_vec());
    let pair = EcdsaKeyPair::from_pkcs8(curve, &pkcs8, &rng)
        .map_err(|e| TokenError::key_init(format!("EC key rejected: {e}")))?;

    Ok(ActiveKeyPair {
        record: KeyRecord::new(kid, pair.public_key().as_ref(), algorithm, created_at),
        encoding_key: EncodingKey::from_ec_der(&pkcs8),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyIdStrategy;

    #[test]
    fn test_generates_es256() {
        let spec = KeySpec::new(SigningAlgorithm::ES256, 2048);
        let pair = generate(&spec, Utc::now()).unwrap();

        assert_eq!(pair.record().algorithm(), SigningAlgorithm::ES256);
        assert_eq!(pair.record().public_key_der().unwrap().len(), 65);
    }

    #[test]
    fn test_generates_es384() {
        let spec = KeySpec::new(SigningAlgorithm::ES384, 2048);
        let pair = generate(&spec, Utc::now()).unwrap();

        assert_eq!(pair.record().public_key_der().unwrap().len(), 97);
    }

    #[test]
    fn test_generates_rsa_with_prefixed_kid() {
        let spec = KeySpec::new(SigningAlgorithm::RS256, 2048)
            .with_kid_strategy(KeyIdStrategy::Prefixed("sig".to_string()));
        let pair = generate(&spec, Utc::now()).unwrap();

        assert!(pair.record().kid().starts_with("sig-"));
        assert!(pair.record().validate_strength().is_ok());
    }

    #[test]
    fn test_rejects_weak_size_for_any_family() {
        for algorithm in [SigningAlgorithm::RS256, SigningAlgorithm::ES256] {
            let spec = KeySpec::new(algorithm, 2047);
            assert!(matches!(
                generate(&spec, Utc::now()),
                Err(TokenError::KeyInitialization(_))
            ));
        }
    }

    #[test]
    fn test_rejects_oversized_rsa() {
        let spec = KeySpec::new(SigningAlgorithm::PS256, 8192);
        assert!(matches!(
            generate(&spec, Utc::now()),
            Err(TokenError::KeyInitialization(_))
        ));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let pair = generate(&KeySpec::new(SigningAlgorithm::ES256, 2048), Utc::now()).unwrap();
        let debug = format!("{pair:?}");
        assert!(debug.contains("ActiveKeyPair"));
        assert!(!debug.contains("encoding_key"));
    }
}
