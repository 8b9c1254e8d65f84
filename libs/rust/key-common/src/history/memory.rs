//! In-memory key history.
//!
//! Does not persist; a restarted process starts empty.

use parking_lot::RwLock;

use super::{Admission, KeyHistory, Retention};
use crate::error::KeyError;
use crate::model::KeyRecord;

/// Key history held in process memory.
///
/// Reads take a shared lock and copy out a snapshot; `add` takes the
/// exclusive lock for the whole check-evict-insert step.
#[derive(Debug)]
pub struct InMemoryKeyHistory {
    retention: RwLock<Retention>,
}

impl InMemoryKeyHistory {
    /// Create an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, KeyError> {
        Ok(Self {
            retention: RwLock::new(Retention::new(capacity)?),
        })
    }
}

impl KeyHistory for InMemoryKeyHistory {
    fn capacity(&self) -> usize {
        self.retention.read().capacity()
    }

    fn len(&self) -> usize {
        self.retention.read().len()
    }

    fn add(&self, record: KeyRecord) -> Result<Admission, KeyError> {
        Ok(self.retention.write().admit(record))
    }

    fn history_newest_first(&self) -> Vec<KeyRecord> {
        self.retention.read().newest_first()
    }

    fn insertion_order(&self) -> Vec<KeyRecord> {
        self.retention.read().insertion_order()
    }

    fn find(&self, kid: &str) -> Option<KeyRecord> {
        self.retention.read().find(kid).cloned()
    }
}
