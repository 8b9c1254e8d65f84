//! Collaborators the verifier depends on but does not own.

use async_trait::async_trait;
use key_common::{KeyHistory, KeyRecord};
use mockall::automock;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::AuthEdgeError;

/// Looks up the public key a token header names.
///
/// Implemented for closures, for [`HistoryResolver`] and for the key
/// distribution cache.
pub trait PublicKeyResolver: Send + Sync {
    /// Record for `kid`, if one is known.
    fn resolve(&self, kid: &str) -> Option<KeyRecord>;
}

impl<F> PublicKeyResolver for F
where
    F: Fn(&str) -> Option<KeyRecord> + Send + Sync,
{
    fn resolve(&self, kid: &str) -> Option<KeyRecord> {
        self(kid)
    }
}

/// Resolves keys straight from a key history.
///
/// Used where the verifier shares a process with the issuer.
#[derive(Clone)]
pub struct HistoryResolver {
    history: Arc<dyn KeyHistory>,
}

impl HistoryResolver {
    /// Wrap `history`.
    #[must_use]
    pub fn new(history: Arc<dyn KeyHistory>) -> Self {
        Self { history }
    }
}

impl std::fmt::Debug for HistoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryResolver")
            .field("retained", &self.history.len())
            .finish()
    }
}

impl PublicKeyResolver for HistoryResolver {
    fn resolve(&self, kid: &str) -> Option<KeyRecord> {
        self.history.find(kid)
    }
}

/// Revoked-token check used in strict mode.
#[automock]
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Whether `token` has been revoked.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::CollaboratorUnavailable`] if the lookup fails.
    async fn is_blacklisted(&self, token: &str) -> Result<bool, AuthEdgeError>;
}

/// Account state as reported by the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
    /// Account name
    pub username: String,
    /// Whether the account may authenticate
    pub enabled: bool,
    /// Authorities granted by the directory
    pub authorities: BTreeSet<String>,
}

impl UserDetails {
    /// An enabled account with no directory authorities.
    #[must_use]
    pub fn enabled(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            enabled: true,
            authorities: BTreeSet::new(),
        }
    }

    /// A disabled account.
    #[must_use]
    pub fn disabled(username: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::enabled(username)
        }
    }
}

/// Account lookup used in strict mode.
#[automock]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Load the account for `subject`; `None` if the directory does not know it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEdgeError::CollaboratorUnavailable`] if the lookup fails.
    async fn load_user(&self, subject: &str) -> Result<Option<UserDetails>, AuthEdgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use key_common::{InMemoryKeyHistory, SigningAlgorithm};

    #[test]
    fn test_closure_resolver() {
        let record = KeyRecord::new("k1", b"\x04", SigningAlgorithm::ES256, Utc::now());
        let known = record.clone();
        let resolver = move |kid: &str| (kid == "k1").then(|| known.clone());

        assert_eq!(resolver.resolve("k1"), Some(record));
        assert_eq!(resolver.resolve("k2"), None);
    }

    #[test]
    fn test_history_resolver() {
        let history = Arc::new(InMemoryKeyHistory::new(2).unwrap());
        let record = KeyRecord::new("k1", b"\x04", SigningAlgorithm::ES256, Utc::now());
        history.add(record.clone()).unwrap();

        let resolver = HistoryResolver::new(history);
        assert_eq!(resolver.resolve("k1"), Some(record));
        assert!(resolver.resolve("missing").is_none());
    }

    #[tokio::test]
    async fn test_mock_directory() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_load_user()
            .times(1)
            .returning(|subject| Ok(Some(UserDetails::disabled(subject))));

        let user = directory.load_user("alice").await.unwrap().unwrap();
        assert!(!user.enabled);
        assert_eq!(user.username, "alice");
    }
}
