use key_common::RotationEvent;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::KeyDistributionCache;

/// Apply every event received on `receiver` to `cache`.
///
/// Rejected events are logged by the cache and skipped. A lagging receiver
/// loses the overwritten events and keeps going; the task ends when every
/// sender is gone.
pub fn spawn_rotation_listener(
    cache: Arc<KeyDistributionCache>,
    mut receiver: broadcast::Receiver<RotationEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let _ = cache.apply(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Rotation listener lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    info!(cached = cache.len(), "Rotation channel closed, listener stopping");
                    break;
                }
            }
        }
    })
}
