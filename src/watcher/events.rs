//! File system event processing pipeline
//!
//! Converts `notify::Event` values into [`ChangeEvent`]s and classifies each
//! one as relevant or noise, together with any watch-tree maintenance the
//! change requires.

use crate::watcher::filtering;
use crate::watcher::types::{ChangeEvent, ChangeKind, Classification, IgnoreReason, TreeAction};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;

/// Flatten a notify event into per-path change events.
///
/// Renames become a removal of the old path and a creation of the new one.
/// Access notifications and unknown kinds produce nothing.
pub fn from_notify(event: &Event) -> Vec<ChangeEvent> {
    let all = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .map(|path| ChangeEvent::new(path.clone(), kind))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                let kind = if idx == 0 {
                    ChangeKind::Removed
                } else {
                    ChangeKind::Created
                };
                ChangeEvent::new(path.clone(), kind)
            })
            .collect(),
        // Backends that cannot tell which side of a rename they saw
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Removed
                };
                ChangeEvent::new(path.clone(), kind)
            })
            .collect(),
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Apply the noise filter and decide which watch-tree change, if any, follows.
pub fn classify(change: &ChangeEvent) -> Classification {
    // Runs before the kind match, so a removed dot-directory keeps its watch.
    if filtering::is_temporary_file(&change.path) {
        return Classification::Ignored(IgnoreReason::TemporaryFile);
    }

    match change.kind {
        ChangeKind::Removed => Classification::Relevant(TreeAction::Unregister(change.path.clone())),
        ChangeKind::Created | ChangeKind::Modified => match std::fs::metadata(&change.path) {
            Err(_) => Classification::Ignored(IgnoreReason::Vanished),
            Ok(meta) if meta.is_dir() && change.kind == ChangeKind::Created => {
                Classification::Relevant(TreeAction::Reconcile(change.path.clone()))
            }
            Ok(_) => Classification::Relevant(TreeAction::None),
        },
    }
}

