//! Bounded key history with FIFO eviction.
//!
//! The same contract backs the issuer's own public-key history and every
//! verifier's mirror of remote keys. Records are kept in insertion order;
//! newest-first views are projections sorted by creation time.

mod file;
mod memory;

pub use file::FileKeyHistory;
pub use memory::InMemoryKeyHistory;

use std::collections::VecDeque;

use crate::error::KeyError;
use crate::model::KeyRecord;

/// Outcome of adding a record to a history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Record was inserted as the newest entry
    Inserted {
        /// Oldest record dropped to stay within capacity
        evicted: Option<KeyRecord>,
    },
    /// A record with the same key id is already retained; nothing changed
    AlreadyPresent,
}

impl Admission {
    /// Whether the record was inserted.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    /// The evicted record, if any.
    #[must_use]
    pub const fn evicted(&self) -> Option<&KeyRecord> {
        match self {
            Self::Inserted { evicted } => evicted.as_ref(),
            Self::AlreadyPresent => None,
        }
    }
}

/// Bounded, insertion-ordered key retention.
///
/// Implementations must make the capacity check, the eviction and the
/// insertion of [`KeyHistory::add`] a single atomic step: concurrent adds may
/// neither jointly exceed capacity nor both evict.
pub trait KeyHistory: Send + Sync {
    /// Maximum number of retained records.
    fn capacity(&self) -> usize;

    /// Number of retained records.
    fn len(&self) -> usize;

    /// Whether no record is retained.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record as newest, evicting the oldest when at capacity.
    ///
    /// Adding a key id that is already retained is a no-op.
    ///
    /// # Errors
    ///
    /// Durable implementations return [`KeyError::Storage`] when the change
    /// cannot be persisted; the history is then unchanged.
    fn add(&self, record: KeyRecord) -> Result<Admission, KeyError>;

    /// Add each record in order.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptyBatch`] for an empty input, leaving the
    /// history unchanged, and otherwise the first error from [`KeyHistory::add`].
    fn add_all(&self, records: Vec<KeyRecord>) -> Result<Vec<Admission>, KeyError> {
        if records.is_empty() {
            return Err(KeyError::EmptyBatch);
        }
        records.into_iter().map(|record| self.add(record)).collect()
    }

    /// Snapshot sorted by creation time, newest first.
    ///
    /// Records created at the same instant keep reverse insertion order.
    fn history_newest_first(&self) -> Vec<KeyRecord>;

    /// Snapshot in canonical insertion order, oldest first.
    fn insertion_order(&self) -> Vec<KeyRecord>;

    /// Point lookup by key id.
    fn find(&self, kid: &str) -> Option<KeyRecord>;
}

/// FIFO ring shared by the history implementations.
#[derive(Debug, Clone)]
pub(crate) struct Retention {
    capacity: usize,
    records: VecDeque<KeyRecord>,
}

impl Retention {
    pub(crate) fn new(capacity: usize) -> Result<Self, KeyError> {
        if capacity == 0 {
            return Err(KeyError::InvalidCapacity);
        }
        Ok(Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        })
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn admit(&mut self, record: KeyRecord) -> Admission {
        if self.find(record.kid()).is_some() {
            return Admission::AlreadyPresent;
        }

        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);

        Admission::Inserted { evicted }
    }

    pub(crate) fn find(&self, kid: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.kid() == kid)
    }

    pub(crate) fn newest_first(&self) -> Vec<KeyRecord> {
        let mut records: Vec<KeyRecord> = self.records.iter().rev().cloned().collect();
        // Stable sort keeps reverse insertion order among equal timestamps.
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        records
    }

    pub(crate) fn insertion_order(&self) -> Vec<KeyRecord> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SigningAlgorithm;
    use chrono::{Duration, Utc};

    fn record(kid: &str, offset_secs: i64) -> KeyRecord {
        KeyRecord::new(
            kid,
            kid.as_bytes(),
            SigningAlgorithm::ES256,
            Utc::now() + Duration::seconds(offset_secs),
        )
    }

    fn kids(records: &[KeyRecord]) -> Vec<&str> {
        records.iter().map(KeyRecord::kid).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(Retention::new(0), Err(KeyError::InvalidCapacity)));
    }

    #[test]
    fn test_admit_evicts_oldest() {
        let mut retention = Retention::new(2).unwrap();
        assert_eq!(retention.admit(record("a", 0)), Admission::Inserted { evicted: None });
        retention.admit(record("b", 1));

        let admission = retention.admit(record("c", 2));
        assert_eq!(admission.evicted().map(KeyRecord::kid), Some("a"));
        assert_eq!(kids(&retention.insertion_order()), vec!["b", "c"]);
    }

    #[test]
    fn test_duplicate_kid_is_noop() {
        let mut retention = Retention::new(2).unwrap();
        retention.admit(record("a", 0));
        retention.admit(record("b", 1));

        assert_eq!(retention.admit(record("a", 5)), Admission::AlreadyPresent);
        assert_eq!(kids(&retention.insertion_order()), vec!["a", "b"]);
    }

    #[test]
    fn test_newest_first_sorts_by_creation_time() {
        let mut retention = Retention::new(3).unwrap();
        retention.admit(record("late", 10));
        retention.admit(record("early", -10));
        retention.admit(record("middle", 0));

        assert_eq!(kids(&retention.newest_first()), vec!["late", "middle", "early"]);
        assert_eq!(kids(&retention.insertion_order()), vec!["late", "early", "middle"]);
    }

    #[test]
    fn test_newest_first_ties_follow_insertion() {
        let now = Utc::now();
        let mut retention = Retention::new(3).unwrap();
        for kid in ["x", "y", "z"] {
            retention.admit(KeyRecord::new(kid, b"k", SigningAlgorithm::ES256, now));
        }

        assert_eq!(kids(&retention.newest_first()), vec!["z", "y", "x"]);
    }
}
