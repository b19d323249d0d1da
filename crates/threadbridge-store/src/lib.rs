//! Durable state for the Jira → Discord thread bridge.
//!
//! Holds the `task_key → thread_id` and `tracker_identity → chat_user_id`
//! mappings plus the active-channel pointer. Every mutation is written through
//! to disk with an atomic temp-file + rename so a crash never leaves a partial
//! document behind.

pub mod active_channel;
pub mod atomic_io;
pub mod identity_store;
pub mod json_map_store;
pub mod task_thread_store;

use std::path::PathBuf;

use thiserror::Error;

pub use active_channel::ActiveChannelStore;
pub use atomic_io::{current_unix_timestamp_ms, write_text_atomic};
pub use identity_store::{IdentityDirectory, IdentityStore};
pub use json_map_store::JsonMapStore;
pub use task_thread_store::{TaskThreadRecords, TaskThreadStore};

pub const TASK_THREAD_MAP_FILE: &str = "task_thread_map.json";
pub const USER_MAPPING_FILE: &str = "user_mapping.json";
pub const ACTIVE_CHANNEL_FILE: &str = "active_channel.json";

/// Failure while persisting or reading bridge state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode state for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
