//! `task_key → thread_id` records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{JsonMapStore, StorageError};

/// Lookup and lifecycle of the discussion thread owned by each task.
pub trait TaskThreadRecords: Send + Sync {
    fn thread_for_task(&self, task_key: &str) -> Option<u64>;

    /// Points `task_key` at `thread_id`, replacing any previous record.
    fn record_thread(&mut self, task_key: &str, thread_id: u64) -> Result<(), StorageError>;

    /// Drops the record for `task_key`; returns whether one existed.
    fn purge_task(&mut self, task_key: &str) -> Result<bool, StorageError>;
}

/// Thread id as written in `task_thread_map.json`.
///
/// Older documents carry ids as JSON strings, so both forms are accepted on
/// read. Ids are always written back as numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThreadId", into = "u64")]
struct StoredThreadId(u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThreadId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawThreadId> for StoredThreadId {
    type Error = String;

    fn try_from(raw: RawThreadId) -> Result<Self, Self::Error> {
        match raw {
            RawThreadId::Number(value) => Ok(Self(value)),
            RawThreadId::Text(text) => text
                .trim()
                .parse::<u64>()
                .map(Self)
                .map_err(|error| format!("invalid thread id '{text}': {error}")),
        }
    }
}

impl From<StoredThreadId> for u64 {
    fn from(value: StoredThreadId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone)]
pub struct TaskThreadStore {
    inner: JsonMapStore<StoredThreadId>,
}

impl TaskThreadStore {
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

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl TaskThreadRecords for TaskThreadStore {
    fn thread_for_task(&self, task_key: &str) -> Option<u64> {
        self.inner.get(task_key).map(|stored| stored.0)
    }

    fn record_thread(&mut self, task_key: &str, thread_id: u64) -> Result<(), StorageError> {
        self.inner
            .insert(task_key, StoredThreadId(thread_id))
            .map(|_| ())
    }

    fn purge_task(&mut self, task_key: &str) -> Result<bool, StorageError> {
        self.inner.remove(task_key).map(|removed| removed.is_some())
    }
}
