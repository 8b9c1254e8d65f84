//! File-backed key history.
//!
//! The retained records are written as a JSON array in insertion order. Every
//! change is staged on a copy, written to a sibling temp file and renamed over
//! the snapshot, so a crash leaves either the old or the new snapshot.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Admission, KeyHistory, Retention};
use crate::error::KeyError;
use crate::model::KeyRecord;

/// Key history persisted to a JSON file.
#[derive(Debug)]
pub struct FileKeyHistory {
    path: PathBuf,
    retention: Mutex<Retention>,
}

impl FileKeyHistory {
    /// Open the history at `path`, loading any existing snapshot.
    ///
    /// A snapshot holding more records than `capacity` is trimmed oldest
    /// first, as if the records had been added one by one.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCapacity`] for a zero capacity,
    /// [`KeyError::Storage`] if the file cannot be read and
    /// [`KeyError::Serialization`] if it is not a valid snapshot.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, KeyError> {
        let path = path.into();
        let mut retention = Retention::new(capacity)?;

        if path.exists() {
            let bytes = fs::read(&path)?;
            let records: Vec<KeyRecord> = serde_json::from_slice(&bytes)?;
            let loaded = records.len();
            for record in records {
                retention.admit(record);
            }
            info!(
                path = %path.display(),
                loaded,
                retained = retention.len(),
                "Loaded key history snapshot"
            );
        }

        Ok(Self {
            path,
            retention: Mutex::new(retention),
        })
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, retention: &Retention) -> Result<(), KeyError> {
        let bytes = serde_json::to_vec_pretty(&retention.insertion_order())?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), records = retention.len(), "Persisted key history");
        Ok(())
    }
}

impl KeyHistory for FileKeyHistory {
    fn capacity(&self) -> usize {
        self.retention.lock().capacity()
    }

    fn len(&self) -> usize {
        self.retention.lock().len()
    }

    fn add(&self, record: KeyRecord) -> Result<Admission, KeyError> {
        let mut retention = self.retention.lock();

        let mut staged = retention.clone();
        let admission = staged.admit(record);
        if admission.is_inserted() {
            self.persist(&staged)?;
            *retention = staged;
        }

        Ok(admission)
    }

    fn history_newest_first(&self) -> Vec<KeyRecord> {
        self.retention.lock().newest_first()
    }

    fn insertion_order(&self) -> Vec<KeyRecord> {
        self.retention.lock().insertion_order()
    }

    fn find(&self, kid: &str) -> Option<KeyRecord> {
        self.retention.lock().find(kid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SigningAlgorithm;
    use chrono::Utc;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("key-history-{}.json", uuid::Uuid::new_v4()))
    }

    fn record(kid: &str) -> KeyRecord {
        KeyRecord::new(kid, kid.as_bytes(), SigningAlgorithm::ES256, Utc::now())
    }

    #[test]
    fn test_survives_reopen() {
        let path = temp_path();
        {
            let history = FileKeyHistory::open(&path, 3).unwrap();
            history.add_all(vec![record("k1"), record("k2")]).unwrap();
        }

        let reopened = FileKeyHistory::open(&path, 3).unwrap();
        let kids: Vec<String> = reopened
            .insertion_order()
            .iter()
            .map(|r| r.kid().to_string())
            .collect();
        assert_eq!(kids, vec!["k1", "k2"]);
        assert!(reopened.find("k2").is_some());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_reopen_with_smaller_capacity_trims_oldest() {
        let path = temp_path();
        {
            let history = FileKeyHistory::open(&path, 4).unwrap();
            history
                .add_all(vec![record("k1"), record("k2"), record("k3"), record("k4")])
                .unwrap();
        }

        let reopened = FileKeyHistory::open(&path, 2).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.find("k1").is_none());
        assert!(reopened.find("k4").is_some());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_failed_persist_leaves_history_unchanged() {
        let dir =
            std::env::temp_dir().join(format!("key-history-missing-{}", uuid::Uuid::new_v4()));
        let history = FileKeyHistory::open(dir.join("history.json"), 2).unwrap();

        let result = history.add(record("k1"));

        assert!(matches!(result, Err(KeyError::Storage(_))));
        assert!(history.is_empty());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let path = temp_path();
        let history = FileKeyHistory::open(&path, 2).unwrap();
        // A non-empty directory at the snapshot path makes the rename fail.
        fs::create_dir_all(path.join("occupied")).unwrap();

        let result = history.add(record("k1"));

        assert!(matches!(result, Err(KeyError::Storage(_))));
        assert!(history.is_empty());
        assert!(!path.with_extension("tmp").exists());

        fs::remove_dir_all(&path).ok();
    }

    #[test]
    fn test_corrupt_snapshot_is_rejected() {
        let path = temp_path();
        fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            FileKeyHistory::open(&path, 2),
            Err(KeyError::Serialization(_))
        ));

        fs::remove_file(&path).ok();
    }
}
