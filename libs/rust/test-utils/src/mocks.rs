//! Mock implementations for testing.
//!
//! This module provides controllable stand-ins for the clock and the
//! rotation-event transport.

use chrono::{DateTime, Duration, Utc};
use key_common::{Clock, RotationEvent, RotationPublisher};
use parking_lot::Mutex;
use std::sync::Arc;

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Create a clock frozen at the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Publisher that records every event it is handed.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<RotationEvent>>>,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events in order.
    #[must_use]
    pub fn events(&self) -> Vec<RotationEvent> {
        self.events.lock().clone()
    }

    /// Number of published events.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Most recently published event.
    #[must_use]
    pub fn last(&self) -> Option<RotationEvent> {
        self.events.lock().last().cloned()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl RotationPublisher for RecordingPublisher {
    fn publish(&self, event: &RotationEvent) {
        self.events.lock().push(event.clone());
    }
}
