//! Signing key lifecycle.
//!
//! The active key pair lives in an [`ArcSwapOption`]: readers load it without
//! locking and always see either the previous pair or the new one in full.
//! Rotations serialize on a mutex that readers never touch. A rotation only
//! swaps the active pair after the new key is generated and recorded in the
//! history, so a failed rotation leaves the previous key in service.

use arc_swap::ArcSwapOption;
use jsonwebtoken::{encode, Header};
use key_common::{Clock, KeyHistory, KeyRecord, SigningAlgorithm, SystemClock};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::key_pair::{self, ActiveKeyPair};
use crate::config::KeySpec;
use crate::error::TokenError;

/// Handle to the key pair that was active when it was obtained.
///
/// Signs with the private key without exposing it. A handle keeps working
/// after a later rotation; it simply keeps signing with the key it captured.
#[derive(Debug, Clone)]
pub struct ActiveSigningKey {
    pair: Arc<ActiveKeyPair>,
}

impl ActiveSigningKey {
    /// Key id written into token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        self.pair.record().kid()
    }

    /// Signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.pair.record().algorithm()
    }

    /// Public record of this key.
    #[must_use]
    pub fn record(&self) -> &KeyRecord {
        self.pair.record()
    }

    /// Serialize and sign `claims`.
    ///
    /// The header's algorithm and key id are overwritten with this key's.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::JwtEncoding`] if serialization or signing fails.
    pub fn sign<T: Serialize>(&self, mut header: Header, claims: &T) -> Result<String, TokenError> {
        header.alg = self.algorithm().jwt_algorithm();
        header.kid = Some(self.kid().to_string());
        Ok(encode(&header, claims, self.pair.encoding_key())?)
    }
}

/// Owns the active signing key and the local public-key history.
pub struct SigningKeyManager {
    spec: KeySpec,
    active: ArcSwapOption<ActiveKeyPair>,
    rotation_lock: Mutex<()>,
    history: Arc<dyn KeyHistory>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SigningKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyManager")
            .field("spec", &self.spec)
            .field("active_kid", &self.active.load().as_ref().map(|p| p.record().kid().to_string()))
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl SigningKeyManager {
    /// Create a manager with no active key.
    ///
    /// Call [`SigningKeyManager::rotate`] before issuing tokens.
    #[must_use]
    pub fn new(spec: KeySpec, history: Arc<dyn KeyHistory>) -> Self {
        Self {
            spec,
            active: ArcSwapOption::empty(),
            rotation_lock: Mutex::new(()),
            history,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom clock for key timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Key parameters used by [`SigningKeyManager::rotate`].
    #[must_use]
    pub const fn spec(&self) -> &KeySpec {
        &self.spec
    }

    /// Generate a new key pair with the configured parameters and make it active.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::KeyInitialization`] if generation fails and
    /// [`TokenError::History`] if the history cannot store the record. In both
    /// cases the previously active key stays active.
    pub fn rotate(&self) -> Result<KeyRecord, TokenError> {
        self.rotate_with(&self.spec)
    }

    /// Generate a new key pair with explicit parameters and make it active.
    ///
    /// # Errors
    ///
    /// Same as [`SigningKeyManager::rotate`].
    pub fn rotate_with(&self, spec: &KeySpec) -> Result<KeyRecord, TokenError> {
        let _guard = self.rotation_lock.lock();

        let pair = key_pair::generate(spec, self.clock.now())?;
        let record = pair.record().clone();

        let admission = self.history.add(record.clone())?;
        if let Some(evicted) = admission.evicted() {
            debug!(kid = %evicted.kid(), "Evicted oldest public key from history");
        }

        let previous = self.active.swap(Some(Arc::new(pair)));
        info!(
            kid = %record.kid(),
            algorithm = %record.algorithm(),
            previous_kid = previous.as_ref().map(|p| p.record().kid()).unwrap_or("none"),
            "Signing key rotated"
        );

        Ok(record)
    }

    /// Whether a rotation has ever succeeded.
    #[must_use]
    pub fn has_active_key(&self) -> bool {
        self.active.load().is_some()
    }

    /// Handle to the current signing key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::KeyInitialization`] if no rotation has succeeded.
    pub fn active_signing_key(&self) -> Result<ActiveSigningKey, TokenError> {
        self.active
            .load_full()
            .map(|pair| ActiveSigningKey { pair })
            .ok_or_else(|| TokenError::key_init("no signing key has been generated yet"))
    }

    /// Public record of the current signing key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::KeyInitialization`] if no rotation has succeeded.
    pub fn active_public_key(&self) -> Result<KeyRecord, TokenError> {
        self.active
            .load()
            .as_ref()
            .map(|pair| pair.record().clone())
            .ok_or_else(|| TokenError::key_init("no signing key has been generated yet"))
    }

    /// Snapshot of retained public keys, newest first.
    #[must_use]
    pub fn key_history(&self) -> Vec<KeyRecord> {
        self.history.history_newest_first()
    }

    /// The backing history.
    #[must_use]
    pub fn history(&self) -> &Arc<dyn KeyHistory> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use key_common::InMemoryKeyHistory;

    fn manager(capacity: usize) -> SigningKeyManager {
        SigningKeyManager::new(
            KeySpec::new(SigningAlgorithm::ES256, 2048),
            Arc::new(InMemoryKeyHistory::new(capacity).unwrap()),
        )
    }

    #[test]
    fn test_no_key_before_first_rotation() {
        let manager = manager(3);

        assert!(!manager.has_active_key());
        assert!(matches!(
            manager.active_signing_key(),
            Err(TokenError::KeyInitialization(_))
        ));
        assert!(matches!(
            manager.active_public_key(),
            Err(TokenError::KeyInitialization(_))
        ));
        assert!(manager.key_history().is_empty());
    }

    #[test]
    fn test_rotation_publishes_and_records() {
        let manager = manager(3);

        let first = manager.rotate().unwrap();
        let second = manager.rotate().unwrap();

        assert_ne!(first.kid(), second.kid());
        assert_eq!(manager.active_public_key().unwrap(), second);
        assert_eq!(manager.active_signing_key().unwrap().kid(), second.kid());
        let kids: Vec<String> = manager.key_history().iter().map(|r| r.kid().to_string()).collect();
        assert_eq!(kids, vec![second.kid().to_string(), first.kid().to_string()]);
    }

    #[test]
    fn test_failed_rotation_keeps_active_key() {
        let manager = manager(3);
        let active = manager.rotate().unwrap();

        let result = manager.rotate_with(&KeySpec::new(SigningAlgorithm::RS256, 2047));

        assert!(matches!(result, Err(TokenError::KeyInitialization(_))));
        assert_eq!(manager.active_public_key().unwrap(), active);
        assert_eq!(manager.key_history().len(), 1);
        let token = manager
            .active_signing_key()
            .unwrap()
            .sign(Header::default(), &serde_json::json!({"sub": "user"}))
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_sign_sets_algorithm_and_kid() {
        let manager = manager(1);
        let record = manager.rotate().unwrap();

        let token = manager
            .active_signing_key()
            .unwrap()
            .sign(Header::default(), &serde_json::json!({"sub": "user"}))
            .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, jsonwebtoken::Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some(record.kid()));
    }
}
