//! Watch tree maintenance
//!
//! Directories are watched one by one (non-recursively) so the set of watched
//! paths is explicit and can be dumped on request. The tree owns its backend;
//! only the file system event task ever holds it, so no locking is needed.

use crate::error::WatchError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Registration calls the tree needs from the notification subsystem.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> notify::Result<()>;
    fn unwatch(&mut self, path: &Path) -> notify::Result<()>;
}

impl WatchBackend for notify::RecommendedWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        notify::Watcher::watch(self, path, notify::RecursiveMode::NonRecursive)
    }

    fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
        notify::Watcher::unwatch(self, path)
    }
}

/// Opaque token for one registered directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WatchHandle(u64);

pub struct WatchTree<B: WatchBackend> {
    backend: B,
    watches: BTreeMap<PathBuf, WatchHandle>,
    next_handle: u64,
}

impl<B: WatchBackend> WatchTree<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            watches: BTreeMap::new(),
            next_handle: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.watches.contains_key(path)
    }

    pub fn handle(&self, path: &Path) -> Option<WatchHandle> {
        self.watches.get(path).copied()
    }

    /// Watched directories in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.watches.keys().cloned().collect()
    }

    /// Start watching `path`. Returns `false` if it was already watched.
    pub fn register(&mut self, path: &Path) -> Result<bool, WatchError> {
        if self.watches.contains_key(path) {
            return Ok(false);
        }
        if !path.exists() {
            return Err(WatchError::PathMissing(path.to_path_buf()));
        }

        self.backend
            .watch(path)
            .map_err(|source| WatchError::Register {
                path: path.to_path_buf(),
                source,
            })?;

        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.watches.insert(path.to_path_buf(), handle);
        info!("watching directory: {}", path.display());
        Ok(true)
    }

    /// Stop watching `path` and every watched directory below it.
    ///
    /// Returns `false` when nothing was watched there.
    pub fn unregister(&mut self, path: &Path) -> bool {
        let doomed: Vec<PathBuf> = self
            .watches
            .keys()
            .filter(|watched| watched.starts_with(path))
            .cloned()
            .collect();

        for watched in &doomed {
            self.watches.remove(watched);
            // The kernel usually drops the watch of a deleted directory on its own.
            if let Err(e) = self.backend.unwatch(watched) {
                debug!("unwatch {} reported: {}", watched.display(), e);
            }
            info!("removing watcher: {}", watched.display());
        }

        !doomed.is_empty()
    }

    /// Depth-first walk of `root`, registering every directory found.
    ///
    /// Any read or registration error aborts the walk and is returned.
    /// Returns the number of newly watched directories.
    pub fn reconcile(&mut self, root: &Path) -> Result<usize, WatchError> {
        let mut added = 0;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|source| WatchError::Walk {
                root: root.to_path_buf(),
                source,
            })?;

            if entry.file_type().is_dir() && self.register(entry.path())? {
                added += 1;
            }
        }

        debug!(
            "Reconciled {}: {} new, {} watched in total",
            root.display(),
            added,
            self.watches.len()
        );
        Ok(added)
    }
}
