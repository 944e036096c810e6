//! Whole-file JSON snapshots shared by the weight and history stores.
//!
//! Every save rewrites the complete file: the value is serialized to a sibling
//! `*.tmp` file which is then renamed over the target, so readers never observe
//! a half-written snapshot.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing file yields `T::default()`; an unreadable or
    /// corrupt file is logged and also yields `T::default()`.
    pub async fn load<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot on disk, starting empty");
                return T::default();
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read snapshot, starting empty");
                return T::default();
            }
        };

        if raw.trim().is_empty() {
            return T::default();
        }

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "corrupt snapshot, resetting to empty");
                T::default()
            }
        }
    }

    pub async fn save<T>(&self, value: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string_pretty(value)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
