//! Rotation triggers.
//!
//! Startup, scheduled and manual rotations all go through
//! [`KeyRotationService::rotate`], which rotates the manager and announces the
//! new key to verifiers.

use key_common::{KeyRecord, RotationEvent, RotationPublisher};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::manager::SigningKeyManager;
use crate::error::TokenError;

/// What caused a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    /// Process startup
    Startup,
    /// Periodic scheduler
    Scheduled,
    /// Operator request
    Manual,
}

impl RotationTrigger {
    /// Trigger name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for RotationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives key rotation and publishes rotation events.
pub struct KeyRotationService {
    manager: Arc<SigningKeyManager>,
    publisher: Arc<dyn RotationPublisher>,
    issuer: String,
    interval: Duration,
}

impl KeyRotationService {
    /// Create a rotation service.
    #[must_use]
    pub fn new(
        manager: Arc<SigningKeyManager>,
        publisher: Arc<dyn RotationPublisher>,
        issuer: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            publisher,
            issuer: issuer.into(),
            interval,
        }
    }

    /// The managed key manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<SigningKeyManager> {
        &self.manager
    }

    /// Rotate once and publish the resulting event.
    ///
    /// # Errors
    ///
    /// Propagates the manager's rotation error; nothing is published then.
    pub fn rotate(&self, trigger: RotationTrigger) -> Result<KeyRecord, TokenError> {
        match self.manager.rotate() {
            Ok(record) => {
                let event = RotationEvent::from_record(&record, &self.issuer);
                self.publisher.publish(&event);
                info!(trigger = %trigger, kid = %record.kid(), "Key rotation completed");
                Ok(record)
            }
            Err(e) => {
                error!(
                    trigger = %trigger,
                    error = %e,
                    retryable = e.is_retryable(),
                    active_key_retained = self.manager.has_active_key(),
                    "Key rotation failed"
                );
                Err(e)
            }
        }
    }

    /// Initial rotation; must succeed before tokens can be issued.
    ///
    /// # Errors
    ///
    /// See [`KeyRotationService::rotate`].
    pub fn startup(&self) -> Result<KeyRecord, TokenError> {
        self.rotate(RotationTrigger::Startup)
    }

    /// Operator-requested rotation.
    ///
    /// # Errors
    ///
    /// See [`KeyRotationService::rotate`].
    pub fn manual(&self) -> Result<KeyRecord, TokenError> {
        self.rotate(RotationTrigger::Manual)
    }

    /// Rotate every interval until `shutdown` resolves.
    ///
    /// The first scheduled rotation happens one interval from now. Key
    /// generation runs on the blocking pool. Failures are logged and the
    /// schedule continues.
    pub async fn run_scheduled<S>(self: Arc<Self>, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Key rotation scheduler started");

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let service = Arc::clone(&self);
                    let outcome = tokio::task::spawn_blocking(move || {
                        service.rotate(RotationTrigger::Scheduled)
                    })
                    .await;
                    if let Err(join_error) = outcome {
                        warn!(error = %join_error, "Scheduled rotation task panicked");
                    }
                }
            }
        }

        info!("Key rotation scheduler stopped");
    }

    /// Spawn [`KeyRotationService::run_scheduled`] on the runtime.
    pub fn spawn_scheduler<S>(self: &Arc<Self>, shutdown: S) -> JoinHandle<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(Arc::clone(self).run_scheduled(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeySpec;
    use key_common::{InMemoryKeyHistory, SigningAlgorithm};
    use test_utils::mocks::RecordingPublisher;

    fn service(interval: Duration) -> (Arc<KeyRotationService>, RecordingPublisher) {
        let manager = Arc::new(SigningKeyManager::new(
            KeySpec::new(SigningAlgorithm::ES256, 2048),
            Arc::new(InMemoryKeyHistory::new(4).unwrap()),
        ));
        let publisher = RecordingPublisher::new();
        let service = KeyRotationService::new(
            manager,
            Arc::new(publisher.clone()),
            "token-service",
            interval,
        );
        (Arc::new(service), publisher)
    }

    #[test]
    fn test_startup_publishes_event() {
        let (service, publisher) = service(Duration::from_secs(60));

        let record = service.startup().unwrap();

        let event = publisher.last().unwrap();
        assert_eq!(event.key_id(), record.kid());
        assert_eq!(event.issuer(), "token-service");
        assert_eq!(event.verification_algorithm(), "ES256");
        assert_eq!(event.signing_algorithm(), "EC");
    }

    #[test]
    fn test_manual_rotation_replaces_active_key() {
        let (service, publisher) = service(Duration::from_secs(60));
        let first = service.startup().unwrap();

        let second = service.manual().unwrap();

        assert_ne!(first.kid(), second.kid());
        assert_eq!(service.manager().active_public_key().unwrap(), second);
        assert_eq!(publisher.count(), 2);
    }

    #[test]
    fn test_trigger_names() {
        assert_eq!(RotationTrigger::Startup.to_string(), "startup");
        assert_eq!(RotationTrigger::Scheduled.as_str(), "scheduled");
        assert_eq!(RotationTrigger::Manual.as_str(), "manual");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_rotates_until_shutdown() {
        let (service, publisher) = service(Duration::from_secs(60));
        service.startup().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = service.spawn_scheduler(async move {
            let _ = stop_rx.await;
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(publisher.count() >= 2, "expected scheduled rotations, got {}", publisher.count());
        assert_eq!(
            service.manager().active_public_key().unwrap().kid(),
            publisher.last().unwrap().key_id()
        );
    }
}
