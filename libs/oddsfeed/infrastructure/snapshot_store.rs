//! Snapshot persistence
//!
//! Writes the exported record list as pretty JSON and reads it back.

use crate::domain::ExportableCacheItem;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to access snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

pub struct SnapshotStore;

impl SnapshotStore {
    /// Write records to `path`, replacing any previous snapshot
    pub fn save(path: impl AsRef<Path>, records: &[ExportableCacheItem]) -> Result<()> {
        let path = path.as_ref();
        debug!("Saving {} snapshot records to {:?}", records.len(), path);

        let json = serde_json::to_string_pretty(records)?;
        fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read records from `path`; a missing or empty file is an empty snapshot
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<ExportableCacheItem>> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Snapshot file not found, starting with empty cache");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<ExportableCacheItem> = serde_json::from_str(&content)?;
        debug!("Loaded {} snapshot records from {:?}", records.len(), path);
        Ok(records)
    }
}
