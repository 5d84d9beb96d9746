//! Failure marker persistence
//!
//! The marker is a plain file. Its presence means the last validation failed
//! and its content is the diagnostic output of that validation. It lives on
//! disk so other tooling can observe it and it survives restarts of the
//! watcher itself.

use crate::error::MarkerError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FailureMarker {
    path: PathBuf,
}

impl FailureMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool, MarkerError> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| MarkerError::Stat {
                path: self.path.clone(),
                source,
            })
    }

    /// Write the diagnostic bytes, replacing any previous content.
    pub async fn write(&self, contents: &[u8]) -> Result<(), MarkerError> {
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| MarkerError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            "Wrote {} bytes to failure marker {}",
            contents.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the marker. Returns `false` when there was nothing to remove.
    pub async fn remove(&self) -> Result<bool, MarkerError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MarkerError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
