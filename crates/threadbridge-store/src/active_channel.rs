//! The channel new task threads are created in.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{write_text_atomic, StorageError};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ActiveChannelDocument {
    #[serde(default)]
    channel_id: Option<u64>,
}

/// Process-wide active channel pointer with explicit get/set/clear.
#[derive(Debug, Clone)]
pub struct ActiveChannelStore {
    path: Option<PathBuf>,
    channel_id: Option<u64>,
    recorded: bool,
}

impl ActiveChannelStore {
    pub fn in_memory(channel_id: Option<u64>) -> Self {
        Self {
            path: None,
            channel_id,
            recorded: channel_id.is_some(),
        }
    }

    /// Loads the persisted pointer. Missing or unreadable files mean "inactive".
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match std::fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<ActiveChannelDocument>(&raw) {
                Ok(document) => Some(document),
                Err(error) => {
                    warn!(path = %path.display(), %error, "active channel file is corrupt; starting inactive");
                    None
                }
            },
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(source) => {
                let error = StorageError::Read {
                    path: path.clone(),
                    source,
                };
                warn!(%error, "active channel file is unreadable; starting inactive");
                None
            }
        };
        Self {
            path: Some(path),
            recorded: document.is_some(),
            channel_id: document.and_then(|document| document.channel_id),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> Option<u64> {
        self.channel_id
    }

    /// True once an activation or deactivation has been persisted, including
    /// one read back from disk. A cleared pointer still counts.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub fn set(&mut self, channel_id: u64) -> Result<(), StorageError> {
        self.channel_id = Some(channel_id);
        self.persist()?;
        self.recorded = true;
        Ok(())
    }

    /// Clears the pointer and returns the channel that was active.
    pub fn clear(&mut self) -> Result<Option<u64>, StorageError> {
        let previous = self.channel_id.take();
        self.persist()?;
        self.recorded = true;
        Ok(previous)
    }

    fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let document = ActiveChannelDocument {
            channel_id: self.channel_id,
        };
        let mut payload =
            serde_json::to_string_pretty(&document).map_err(|source| StorageError::Encode {
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
