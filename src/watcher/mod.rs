//! Config tree watcher
//!
//! This module wires file system notifications to the debounced
//! validate/restart cycle.
//!
//! # Architecture
//!
//! Two long-running tasks, connected by channels:
//! 1. **File system events** → classify each change, maintain the watch tree,
//!    forward relevant changes to the debounce task
//! 2. **Debounce** → count relevant changes, run at most one reconcile cycle
//!    per period
//!
//! The watch tree lives inside the first task and the pending counter inside
//! the second; nothing is shared. Operator requests (dumping the watch set)
//! reach the tree through a [`TreeCommand`] channel.

pub mod debounce;
pub mod events;
pub mod filtering;
pub mod tree;
pub mod types;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::marker::FailureMarker;
use crate::reconcile::ReconcileCycle;
use crate::supervisor::ServiceSupervisor;

pub use debounce::{DebounceCoordinator, DebounceMessage};
pub use tree::{WatchBackend, WatchHandle, WatchTree};
pub use types::{ChangeEvent, ChangeKind, Classification, IgnoreReason, TreeAction};

type RawEvent = notify::Result<notify::Event>;

/// Requests served by the task that owns the watch tree
#[derive(Debug)]
pub enum TreeCommand {
    /// Log every watched directory
    Dump,
    /// Reply with the watched directories
    Snapshot(oneshot::Sender<Vec<PathBuf>>),
}

/// Builds and starts the watcher tasks
pub struct ConfigWatcher {
    settings: Settings,
    supervisor: Arc<dyn ServiceSupervisor>,
}

/// Running watcher: control channel plus task handles
pub struct WatcherHandle {
    root: PathBuf,
    control: mpsc::UnboundedSender<TreeCommand>,
    events_task: JoinHandle<()>,
    debounce_task: JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn new(settings: Settings, supervisor: Arc<dyn ServiceSupervisor>) -> Self {
        Self {
            settings,
            supervisor,
        }
    }

    /// Watch the configured root and spawn the event and debounce tasks.
    ///
    /// Failing to watch the root is fatal; everything after startup only logs.
    pub fn start(self, shutdown: CancellationToken) -> Result<WatcherHandle> {
        self.settings.validate().context("Invalid watcher settings")?;

        let root = self
            .settings
            .config_dir
            .canonicalize()
            .with_context(|| {
                format!(
                    "Config directory {} is not accessible",
                    self.settings.config_dir.display()
                )
            })?;

        info!("Starting config watcher for: {}", root.display());

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawEvent>();
        let watcher = notify::recommended_watcher(move |res| {
            if let Err(e) = raw_tx.send(res) {
                error!("Failed to send file event: {}", e);
            }
        })
        .context("Failed to create file system watcher")?;

        let mut tree = WatchTree::new(watcher);
        tree.reconcile(&root)
            .context("Failed to start watching config directory")?;
        info!("Watching {} directories", tree.len());

        let (debounce_tx, debounce_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let events_task = tokio::spawn(run_event_loop(
            tree,
            raw_rx,
            control_rx,
            debounce_tx,
            shutdown.clone(),
        ));

        let cycle = ReconcileCycle::new(
            self.supervisor,
            FailureMarker::new(&self.settings.trigger_file),
            self.settings.dry_run,
        );
        let coordinator = DebounceCoordinator::new(self.settings.refresh, cycle);
        let debounce_task = tokio::spawn(coordinator.run(debounce_rx, shutdown));

        Ok(WatcherHandle {
            root,
            control: control_tx,
            events_task,
            debounce_task,
        })
    }
}

impl WatcherHandle {
    /// Canonical root being watched.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn control(&self) -> mpsc::UnboundedSender<TreeCommand> {
        self.control.clone()
    }

    /// Ask the event task for the current watch set.
    pub async fn watched_paths(&self) -> Result<Vec<PathBuf>> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(TreeCommand::Snapshot(tx))
            .map_err(|_| anyhow::anyhow!("File system event task is not running"))?;
        rx.await.context("File system event task dropped the request")
    }

    /// Wait for both tasks to finish (after the shutdown token is cancelled).
    pub async fn join(self) {
        if let Err(e) = self.events_task.await {
            warn!("File system event task ended abnormally: {}", e);
        }
        if let Err(e) = self.debounce_task.await {
            warn!("Debounce task ended abnormally: {}", e);
        }
    }
}

/// File system event task: the single owner of the watch tree.
pub(crate) async fn run_event_loop<B: WatchBackend>(
    mut tree: WatchTree<B>,
    mut raw: mpsc::UnboundedReceiver<RawEvent>,
    mut control: mpsc::UnboundedReceiver<TreeCommand>,
    debounce: mpsc::UnboundedSender<DebounceMessage>,
    shutdown: CancellationToken,
) {
    info!("🔍 File system event detector started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(command) = control.recv() => handle_command(&tree, command),
            event = raw.recv() => match event {
                Some(Ok(event)) => {
                    for change in events::from_notify(&event) {
                        // Tree maintenance finishes before the change is counted.
                        if process_change(&mut tree, &change)
                            && debounce.send(DebounceMessage::RelevantChange).is_err()
                        {
                            warn!("Debounce task is gone, dropping change");
                        }
                    }
                }
                Some(Err(e)) => warn!("File watcher error: {}", e),
                None => {
                    debug!("Notification channel closed");
                    break;
                }
            }
        }
    }
    info!("File system event detector stopped");
}

/// Classify one change and apply its tree maintenance. Returns true if the
/// change should count toward the next cycle.
pub(crate) fn process_change<B: WatchBackend>(tree: &mut WatchTree<B>, change: &ChangeEvent) -> bool {
    debug!("event: {:?} {}", change.kind, change.path.display());

    match events::classify(change) {
        Classification::Ignored(IgnoreReason::TemporaryFile) => {
            debug!("skipping temporary file: {}", change.path.display());
            false
        }
        Classification::Ignored(IgnoreReason::Vanished) => {
            debug!("{} vanished before it could be inspected", change.path.display());
            false
        }
        Classification::Relevant(TreeAction::Reconcile(dir)) => {
            if let Err(e) = tree.reconcile(&dir) {
                warn!("Failed to watch new directory {}: {}", dir.display(), e);
            }
            true
        }
        Classification::Relevant(TreeAction::Unregister(path)) => {
            tree.unregister(&path);
            true
        }
        Classification::Relevant(TreeAction::None) => {
            debug!("Doing nothing");
            true
        }
    }
}

fn handle_command<B: WatchBackend>(tree: &WatchTree<B>, command: TreeCommand) {
    match command {
        TreeCommand::Dump => {
            let paths = tree.paths();
            info!("Dumping watchers: {} directories", paths.len());
            for path in paths {
                info!("  {}", path.display());
            }
        }
        TreeCommand::Snapshot(reply) => {
            let _ = reply.send(tree.paths());
        }
    }
}
