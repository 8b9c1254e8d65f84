//! Rotation events and their transport.
//!
//! A rotation event carries everything a verifier needs to start trusting a
//! new public key. Delivery is fire-and-forget; consumers must tolerate
//! duplicates and apply events idempotently by key id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::KeyError;
use crate::model::{KeyFamily, KeyRecord, SigningAlgorithm};

/// Notification that the issuer rotated to a new signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationEvent {
    key_id: String,
    encoded_public_key: String,
    /// Key family, e.g. `RSA` or `EC`
    signing_algorithm: String,
    /// JWS algorithm name, e.g. `RS256`
    verification_algorithm: String,
    issuer: String,
    issued_at: DateTime<Utc>,
}

impl RotationEvent {
    /// Build the event announcing `record`, stamped with the record's creation time.
    #[must_use]
    pub fn from_record(record: &KeyRecord, issuer: impl Into<String>) -> Self {
        let algorithm = record.algorithm();
        Self {
            key_id: record.kid().to_string(),
            encoded_public_key: record.encoded_public_key().to_string(),
            signing_algorithm: algorithm.family().as_str().to_string(),
            verification_algorithm: algorithm.as_str().to_string(),
            issuer: issuer.into(),
            issued_at: record.created_at(),
        }
    }

    /// Key id of the announced key.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Base64-encoded public key.
    #[must_use]
    pub fn encoded_public_key(&self) -> &str {
        &self.encoded_public_key
    }

    /// Key family name.
    #[must_use]
    pub fn signing_algorithm(&self) -> &str {
        &self.signing_algorithm
    }

    /// JWS algorithm name.
    #[must_use]
    pub fn verification_algorithm(&self) -> &str {
        &self.verification_algorithm
    }

    /// Identity of the issuing service.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// When the key was created.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Convert the event into the record a verifier stores.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidEvent`] for an empty key id or public key,
    /// [`KeyError::UnsupportedAlgorithm`] for an unknown verification
    /// algorithm, and [`KeyError::InvalidEvent`] when the declared family does
    /// not match the verification algorithm.
    pub fn to_record(&self) -> Result<KeyRecord, KeyError> {
        if self.key_id.trim().is_empty() {
            return Err(KeyError::invalid_event("missing key id"));
        }
        if self.encoded_public_key.trim().is_empty() {
            return Err(KeyError::invalid_event(format!(
                "missing public key for {}",
                self.key_id
            )));
        }

        let algorithm: SigningAlgorithm = self.verification_algorithm.parse()?;
        let family: KeyFamily = self.signing_algorithm.parse()?;
        if family != algorithm.family() {
            return Err(KeyError::invalid_event(format!(
                "{} keys cannot verify {}",
                self.signing_algorithm, self.verification_algorithm
            )));
        }

        Ok(KeyRecord::from_encoded(
            &self.key_id,
            &self.encoded_public_key,
            algorithm,
            self.issued_at,
        ))
    }
}

/// Sink for rotation events.
///
/// Publishing never fails from the caller's point of view; an event with no
/// listeners is dropped.
pub trait RotationPublisher: Send + Sync {
    /// Hand an event to the transport.
    fn publish(&self, event: &RotationEvent);
}

/// In-process rotation transport over a `tokio` broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastRotationChannel {
    sender: broadcast::Sender<RotationEvent>,
}

impl BroadcastRotationChannel {
    /// Create a channel buffering up to `capacity` undelivered events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe a new consumer; it receives events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RotationEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl RotationPublisher for BroadcastRotationChannel {
    fn publish(&self, event: &RotationEvent) {
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(kid = %event.key_id, receivers, "Rotation event published"),
            Err(_) => debug!(kid = %event.key_id, "Rotation event dropped, no subscribers"),
        }
    }
}
