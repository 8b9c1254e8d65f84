use key_common::{Admission, InMemoryKeyHistory, KeyError, KeyHistory, KeyRecord, RotationEvent};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::contracts::PublicKeyResolver;

/// Bounded mirror of remote public keys, fed by rotation events.
///
/// Backed by the same FIFO history the issuer uses. Its capacity is chosen
/// per consumer and should be at least the issuer's, otherwise a token signed
/// with a key the issuer still retains may no longer resolve here.
#[derive(Debug)]
pub struct KeyDistributionCache {
    history: InMemoryKeyHistory,
    trusted_issuer: Option<String>,
}

impl KeyDistributionCache {
    /// Create a cache retaining at most `capacity` keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] for a capacity of zero.
    pub fn new(capacity: usize) -> Result<Self, KeyError> {
        Ok(Self {
            history: InMemoryKeyHistory::new(capacity)?,
            trusted_issuer: None,
        })
    }

    /// Create a cache sized from configuration, trusting only the expected
    /// issuer when one is set.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] for a capacity of zero.
    pub fn from_config(config: &Config) -> Result<Self, KeyError> {
        let cache = Self::new(config.key_cache_capacity)?;
        Ok(match &config.expected_issuer {
            Some(issuer) => cache.with_trusted_issuer(issuer),
            None => cache,
        })
    }

    /// Reject events announced by any other issuer.
    #[must_use]
    pub fn with_trusted_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.trusted_issuer = Some(issuer.into());
        self
    }

    /// Apply a rotation event.
    ///
    /// Applying an event whose key id is already cached changes nothing, so
    /// duplicate deliveries are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidEvent`] for an untrusted issuer or an
    /// inconsistent payload, and [`KeyError::WeakKey`] or
    /// [`KeyError::InvalidKeyMaterial`] for unacceptable key material.
    pub fn apply(&self, event: &RotationEvent) -> Result<Admission, KeyError> {
        let result = self.admit(event);
        if let Err(e) = &result {
            warn!(
                kid = %event.key_id(),
                issuer = %event.issuer(),
                error = %e,
                "Rejected rotation event"
            );
        }
        result
    }

    /// Apply a JSON-encoded rotation event from an external transport.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Serialization`] if the payload does not parse, and
    /// otherwise the errors of [`Self::apply`].
    pub fn apply_json(&self, payload: &str) -> Result<Admission, KeyError> {
        let event: RotationEvent = serde_json::from_str(payload).map_err(|e| {
            warn!(error = %e, "Unparseable rotation event payload");
            KeyError::from(e)
        })?;
        self.apply(&event)
    }

    fn admit(&self, event: &RotationEvent) -> Result<Admission, KeyError> {
        if let Some(trusted) = &self.trusted_issuer {
            if event.issuer() != trusted {
                return Err(KeyError::invalid_event(format!(
                    "issuer {} is not trusted",
                    event.issuer()
                )));
            }
        }

        let record = event.to_record()?;
        record.validate_strength()?;

        let admission = self.history.add(record)?;
        match &admission {
            Admission::Inserted { evicted } => info!(
                kid = %event.key_id(),
                algorithm = %event.verification_algorithm(),
                evicted = evicted.as_ref().map(KeyRecord::kid),
                "Cached rotated public key"
            ),
            Admission::AlreadyPresent => {
                debug!(kid = %event.key_id(), "Rotation event already applied");
            }
        }
        Ok(admission)
    }

    /// Look up a cached key.
    #[must_use]
    pub fn resolve(&self, kid: &str) -> Option<KeyRecord> {
        self.history.find(kid)
    }

    /// Cached key ids, oldest first.
    #[must_use]
    pub fn key_ids(&self) -> Vec<String> {
        self.history
            .insertion_order()
            .iter()
            .map(|record| record.kid().to_string())
            .collect()
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no key has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Maximum number of cached keys.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }
}

impl PublicKeyResolver for KeyDistributionCache {
    fn resolve(&self, kid: &str) -> Option<KeyRecord> {
        Self::resolve(self, kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use key_common::SigningAlgorithm;
    use test_utils::fixtures::TestSigningKey;

    fn event(kid: &str) -> RotationEvent {
        RotationEvent::from_record(TestSigningKey::es256(kid).record(), "https://auth.example.com")
    }

    #[test]
    fn test_apply_then_resolve() {
        let cache = KeyDistributionCache::new(3).unwrap();
        let event = event("k1");

        let admission = cache.apply(&event).unwrap();

        assert!(admission.is_inserted());
        let record = cache.resolve("k1").unwrap();
        assert_eq!(record.encoded_public_key(), event.encoded_public_key());
        assert_eq!(record.algorithm(), SigningAlgorithm::ES256);
        assert!(cache.resolve("k2").is_none());
    }

    #[test]
    fn test_duplicate_event_is_idempotent() {
        let cache = KeyDistributionCache::new(2).unwrap();
        let first = event("k1");
        cache.apply(&first).unwrap();
        cache.apply(&event("k2")).unwrap();

        assert_eq!(cache.apply(&first).unwrap(), Admission::AlreadyPresent);
        assert_eq!(cache.key_ids(), ["k1", "k2"]);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = KeyDistributionCache::new(2).unwrap();
        for kid in ["k1", "k2", "k3"] {
            cache.apply(&event(kid)).unwrap();
        }

        assert_eq!(cache.key_ids(), ["k2", "k3"]);
        assert!(cache.resolve("k1").is_none());
        assert_eq!(cache.len(), cache.capacity());
    }

    #[test]
    fn test_untrusted_issuer_rejected() {
        let cache = KeyDistributionCache::new(2)
            .unwrap()
            .with_trusted_issuer("https://other.example.com");

        let result = cache.apply(&event("k1"));

        assert!(matches!(result, Err(KeyError::InvalidEvent(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_weak_material_rejected() {
        let cache = KeyDistributionCache::new(2).unwrap();
        let short = KeyRecord::new("short", &[0x04; 10], SigningAlgorithm::ES256, Utc::now());

        let result = cache.apply(&RotationEvent::from_record(&short, "iss"));

        assert!(matches!(result, Err(KeyError::InvalidKeyMaterial { .. })));
        assert!(cache.resolve("short").is_none());
    }

    #[test]
    fn test_apply_json_payload() {
        let cache = KeyDistributionCache::new(2).unwrap();
        let payload = serde_json::to_string(&event("k1")).unwrap();

        assert!(cache.apply_json(&payload).unwrap().is_inserted());
        assert!(matches!(
            cache.apply_json("{\"keyId\":"),
            Err(KeyError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_config_trusts_expected_issuer() {
        let config = Config {
            expected_issuer: Some("https://auth.example.com".to_string()),
            key_cache_capacity: 4,
            ..Config::default()
        };
        let cache = KeyDistributionCache::from_config(&config).unwrap();

        assert_eq!(cache.capacity(), 4);
        assert!(cache.apply(&event("k1")).is_ok());
        assert!(cache
            .apply(&RotationEvent::from_record(TestSigningKey::es256("k2").record(), "rogue"))
            .is_err());
    }
}
