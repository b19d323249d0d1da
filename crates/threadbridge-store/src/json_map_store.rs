//! Flat JSON object store with write-through persistence.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::{current_unix_timestamp_ms, write_text_atomic, StorageError};

/// A `String → V` map mirrored to a human-readable JSON document.
///
/// Mutations update memory first and then rewrite the whole document. When the
/// write fails the in-memory entry is kept, so the running process still sees
/// its own change while the caller decides how loudly to report the failure.
#[derive(Debug, Clone)]
pub struct JsonMapStore<V> {
    path: Option<PathBuf>,
    entries: BTreeMap<String, V>,
}

impl<V> JsonMapStore<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    /// Loads `path`, degrading to an empty map instead of failing.
    ///
    /// A missing file is created empty. A file that cannot be read or does not
    /// parse is moved to `<file>.corrupt-<unix_ms>` and replaced by an empty
    /// document, so the original bytes are never overwritten in place.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "state file not found; creating an empty one");
                return Self::fresh(path);
            }
            Err(source) => {
                let error = StorageError::Read {
                    path: path.clone(),
                    source,
                };
                warn!(%error, "state file is unreadable; continuing with an empty map");
                quarantine_corrupt_file(&path);
                return Self::fresh(path);
            }
        };

        match serde_json::from_slice::<BTreeMap<String, V>>(&raw) {
            Ok(entries) => Self {
                path: Some(path),
                entries,
            },
            Err(error) => {
                warn!(
                    path = %path.display(),
                    %error,
                    "state file is corrupt; continuing with an empty map"
                );
                quarantine_corrupt_file(&path);
                Self::fresh(path)
            }
        }
    }

    fn fresh(path: PathBuf) -> Self {
        let store = Self {
            path: Some(path),
            entries: BTreeMap::new(),
        };
        if let Err(error) = store.save() {
            warn!(%error, "failed to create empty state file");
        }
        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    /// Inserts and persists; returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<Option<V>, StorageError> {
        let previous = self.entries.insert(key.into(), value);
        self.save()?;
        Ok(previous)
    }

    /// Removes and persists. Nothing is written when the key was absent.
    pub fn remove(&mut self, key: &str) -> Result<Option<V>, StorageError> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Rewrites the full document. No-op for in-memory stores.
    pub fn save(&self) -> Result<(), StorageError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let mut payload =
            serde_json::to_string_pretty(&self.entries).map_err(|source| StorageError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        payload.push('\n');
        write_text_atomic(path, &payload).map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn quarantine_corrupt_file(path: &Path) {
    let backup = PathBuf::from(format!(
        "{}.corrupt-{}",
        path.display(),
        current_unix_timestamp_ms()
    ));
    match std::fs::rename(path, &backup) {
        Ok(()) => warn!(backup = %backup.display(), "corrupt state file preserved"),
        Err(error) => warn!(
            path = %path.display(),
            %error,
            "failed to preserve corrupt state file; it will be overwritten"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::JsonMapStore;

    #[test]
    fn functional_load_creates_missing_file_with_empty_object() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("user_mapping.json");
        let store = JsonMapStore::<String>::load(&path);
        assert!(store.is_empty());
        let raw = std::fs::read_to_string(&path).expect("file created");
        assert_eq!(raw.trim(), "{}");
    }

    #[test]
    fn functional_insert_writes_through_and_survives_reload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("user_mapping.json");
        let mut store = JsonMapStore::<String>::load(&path);
        store
            .insert("jdoe", "1001".to_string())
            .expect("insert persists");
        store
            .insert("ana@example.com", "1002".to_string())
            .expect("insert persists");

        let reloaded = JsonMapStore::<String>::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("jdoe").map(String::as_str), Some("1001"));
    }

    #[test]
    fn functional_remove_persists_only_when_key_existed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("user_mapping.json");
        let mut store = JsonMapStore::<String>::load(&path);
        store.insert("jdoe", "1001".to_string()).expect("insert");

        assert_eq!(store.remove("missing").expect("remove"), None);
        assert_eq!(
            store.remove("jdoe").expect("remove"),
            Some("1001".to_string())
        );
        let reloaded = JsonMapStore::<String>::load(&path);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn regression_corrupt_file_degrades_to_empty_map_and_is_preserved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("task_thread_map.json");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let store = JsonMapStore::<u64>::load(&path);
        assert!(store.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).expect("rewritten").trim(),
            "{}"
        );
        let preserved = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("task_thread_map.json.corrupt-")
            });
        assert!(preserved, "corrupt document should be kept aside");
    }

    #[test]
    fn regression_non_utf8_file_is_preserved_before_first_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("user_mapping.json");
        let original: &[u8] = b"{\"jo\xe3o\": \"4242\"}";
        std::fs::write(&path, original).expect("seed latin-1 file");

        let mut store = JsonMapStore::<String>::load(&path);
        assert!(store.is_empty());
        store.insert("jdoe", "1".to_string()).expect("insert");

        let backups: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("user_mapping.json.corrupt-")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            std::fs::read(backups[0].path()).expect("backup readable"),
            original
        );
        let reloaded = JsonMapStore::<String>::load(&path);
        assert_eq!(reloaded.get("jdoe").map(String::as_str), Some("1"));
    }

    #[test]
    fn unit_in_memory_store_never_touches_disk() {
        let mut store = JsonMapStore::<u64>::in_memory();
        store.insert("T-1", 42).expect("insert");
        assert!(store.path().is_none());
        assert_eq!(store.get("T-1"), Some(&42));
    }
}
