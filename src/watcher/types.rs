//! Type definitions for watcher events and classification results

use std::path::PathBuf;

/// Kinds of file system change the watcher reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single change notification, consumed once by the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Watch-tree maintenance requested by a relevant change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAction {
    None,
    /// A directory appeared: walk it and watch every directory inside
    Reconcile(PathBuf),
    /// A path disappeared: drop its watch (and any below it) if present
    Unregister(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Editor swap or other dot-prefixed scratch file
    TemporaryFile,
    /// Gone before it could be inspected
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ignored(IgnoreReason),
    Relevant(TreeAction),
}

impl Classification {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Classification::Relevant(_))
    }
}
