//! Wiring shared by the end-to-end tests.
//!
//! Builds an issuing side and an edge side connected by an in-process
//! rotation channel, the way a deployment connects them through a broker.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use auth_edge::{spawn_rotation_listener, KeyDistributionCache, TokenVerifier};
use key_common::{BroadcastRotationChannel, InMemoryKeyHistory, KeyError, SigningAlgorithm};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use token_service::{KeyRotationService, KeySpec, SigningKeyManager, TokenError, TokenIssuer};

/// Issuer name both sides agree on.
pub const ISSUER: &str = "https://auth.example.com";

/// Audience issued tokens carry by default.
pub const DEFAULT_AUDIENCE: &str = "orders-api";

/// Issuing side: key manager, rotation service and token issuer.
pub struct IssuingSide {
    /// Publishes every rotation to the channel
    pub rotation: Arc<KeyRotationService>,
    /// Signs with the manager's active key
    pub issuer: TokenIssuer,
    /// Transport between the two sides
    pub channel: BroadcastRotationChannel,
}

impl IssuingSide {
    /// ES256 keys, a history of `history_capacity` and a 15 minute validity.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] for a zero capacity.
    pub fn es256(history_capacity: usize) -> Result<Self, KeyError> {
        let manager = Arc::new(SigningKeyManager::new(
            KeySpec::new(SigningAlgorithm::ES256, 2048),
            Arc::new(InMemoryKeyHistory::new(history_capacity)?),
        ));
        let channel = BroadcastRotationChannel::new(64);
        let rotation = Arc::new(KeyRotationService::new(
            Arc::clone(&manager),
            Arc::new(channel.clone()),
            ISSUER,
            Duration::from_secs(3600),
        ));
        let issuer = TokenIssuer::new(manager, ISSUER, DEFAULT_AUDIENCE, 15);
        Ok(Self {
            rotation,
            issuer,
            channel,
        })
    }

    /// Rotate `times` times.
    ///
    /// # Errors
    ///
    /// Propagates the first rotation failure.
    pub fn rotate(&self, times: usize) -> Result<(), TokenError> {
        for _ in 0..times {
            self.rotation.manual()?;
        }
        Ok(())
    }
}

/// Edge side: key cache fed by a listener task.
pub struct EdgeSide {
    /// Mirrored public keys
    pub cache: Arc<KeyDistributionCache>,
    /// Verifier resolving against the cache
    pub verifier: TokenVerifier,
    /// Listener task; ends when the channel closes
    pub listener: JoinHandle<()>,
}

impl EdgeSide {
    /// Subscribe a cache of `capacity` keys to `channel`.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] for a zero capacity.
    pub fn subscribe(
        channel: &BroadcastRotationChannel,
        capacity: usize,
    ) -> Result<Self, KeyError> {
        let cache = Arc::new(KeyDistributionCache::new(capacity)?.with_trusted_issuer(ISSUER));
        let listener = spawn_rotation_listener(Arc::clone(&cache), channel.subscribe());
        let verifier = TokenVerifier::new(cache.clone()).with_expected_issuer(ISSUER);
        Ok(Self {
            cache,
            verifier,
            listener,
        })
    }

    /// Wait until the listener has cached `kid`; `false` after five seconds.
    pub async fn wait_for(&self, kid: &str) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.cache.resolve(kid).is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .is_ok()
    }
}
