//! `tracker_identity → chat_user_id` associations.

use std::path::PathBuf;

use crate::{JsonMapStore, StorageError};

/// Directory of tracker identities known to map onto a chat user.
///
/// Keys are unique; several identities may point at the same chat user.
pub trait IdentityDirectory: Send + Sync {
    fn chat_user_for(&self, tracker_identity: &str) -> Option<&str>;

    fn associate(&mut self, tracker_identity: &str, chat_user_id: &str)
        -> Result<(), StorageError>;

    /// Removes an association; returns whether one existed.
    fn dissociate(&mut self, tracker_identity: &str) -> Result<bool, StorageError>;

    /// All associations ordered by tracker identity.
    fn associations(&self) -> Vec<(String, String)>;
}

#[derive(Debug, Clone)]
pub struct IdentityStore {
    inner: JsonMapStore<String>,
}

impl IdentityStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonMapStore::load(path),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            inner: JsonMapStore::in_memory(),
        }
    }

    /// In-memory directory seeded with `entries`.
    pub fn from_pairs<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::in_memory();
        for (identity, user) in entries {
            // in-memory inserts cannot fail
            let _ = store.inner.insert(identity, user.into());
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl IdentityDirectory for IdentityStore {
    fn chat_user_for(&self, tracker_identity: &str) -> Option<&str> {
        self.inner.get(tracker_identity).map(String::as_str)
    }

    fn associate(
        &mut self,
        tracker_identity: &str,
        chat_user_id: &str,
    ) -> Result<(), StorageError> {
        self.inner
            .insert(tracker_identity, chat_user_id.to_string())
            .map(|_| ())
    }

    fn dissociate(&mut self, tracker_identity: &str) -> Result<bool, StorageError> {
        self.inner
            .remove(tracker_identity)
            .map(|removed| removed.is_some())
    }

    fn associations(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .map(|(identity, user)| (identity.clone(), user.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityDirectory, IdentityStore};

    #[test]
    fn functional_many_identities_may_share_one_chat_user() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("user_mapping.json");
        let mut store = IdentityStore::load(&path);
        store.associate("jdoe", "555").expect("associate");
        store
            .associate("jdoe@example.com", "555")
            .expect("associate");

        let reloaded = IdentityStore::load(&path);
        assert_eq!(reloaded.chat_user_for("jdoe"), Some("555"));
        assert_eq!(reloaded.chat_user_for("jdoe@example.com"), Some("555"));
        assert_eq!(
            reloaded.associations(),
            vec![
                ("jdoe".to_string(), "555".to_string()),
                ("jdoe@example.com".to_string(), "555".to_string()),
            ]
        );
    }

    #[test]
    fn unit_reassociating_replaces_previous_chat_user() {
        let mut store = IdentityStore::from_pairs([("jdoe", "1")]);
        store.associate("jdoe", "2").expect("associate");
        assert_eq!(store.chat_user_for("jdoe"), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unit_dissociate_reports_missing_identity() {
        let mut store = IdentityStore::from_pairs([("jdoe", "1")]);
        assert!(store.dissociate("jdoe").expect("dissociate"));
        assert!(!store.dissociate("jdoe").expect("dissociate again"));
        assert!(store.is_empty());
    }
}
