//! Tests for the file system event task

use crate::tests::helpers::{FakeBackend, unique_temp_dir};
use crate::watcher::{DebounceMessage, TreeCommand, WatchTree, run_event_loop};
use notify::Event;
use notify::event::{CreateKind, DataChange, EventKind, ModifyKind, RemoveKind};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

struct Harness {
    raw: mpsc::UnboundedSender<notify::Result<Event>>,
    control: mpsc::UnboundedSender<TreeCommand>,
    relevant: mpsc::UnboundedReceiver<DebounceMessage>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(root: &std::path::Path) -> Self {
        let mut tree = WatchTree::new(FakeBackend::default());
        tree.reconcile(root).unwrap();

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (debounce_tx, debounce_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_event_loop(
            tree,
            raw_rx,
            control_rx,
            debounce_tx,
            shutdown.clone(),
        ));

        Self {
            raw: raw_tx,
            control: control_tx,
            relevant: debounce_rx,
            shutdown,
            task,
        }
    }

    async fn snapshot(&self) -> Vec<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.control.send(TreeCommand::Snapshot(tx)).unwrap();
        rx.await.unwrap()
    }

    async fn next_relevant(&mut self) -> DebounceMessage {
        tokio::time::timeout(Duration::from_secs(5), self.relevant.recv())
            .await
            .expect("timed out waiting for relevant change")
            .expect("event task closed the channel")
    }

    async fn stop(self) -> mpsc::UnboundedReceiver<DebounceMessage> {
        self.shutdown.cancel();
        self.task.await.unwrap();
        self.relevant
    }
}

#[tokio::test]
async fn test_new_directory_is_watched_before_change_is_counted() {
    let temp_dir = unique_temp_dir("loop_new_dir");
    let root = temp_dir.path().to_path_buf();
    let mut harness = Harness::start(&root);

    fs::create_dir_all(root.join("A/B/C")).unwrap();
    harness
        .raw
        .send(Ok(Event::new(EventKind::Create(CreateKind::Folder)).add_path(root.join("A"))))
        .unwrap();

    assert_eq!(harness.next_relevant().await, DebounceMessage::RelevantChange);

    // By the time the change was forwarded the walk had finished
    let watched = harness.snapshot().await;
    assert!(watched.contains(&root.join("A")));
    assert!(watched.contains(&root.join("A/B")));
    assert!(watched.contains(&root.join("A/B/C")));

    harness.stop().await;
}

#[tokio::test]
async fn test_subsystem_errors_and_noise_are_not_counted() {
    let temp_dir = unique_temp_dir("loop_noise");
    let root = temp_dir.path().to_path_buf();
    fs::write(root.join("site.cfg"), "define host {}").unwrap();
    let mut harness = Harness::start(&root);

    harness.raw.send(Err(notify::Error::generic("queue overflow"))).unwrap();
    harness
        .raw
        .send(Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(root.join(".site.cfg.swp"))))
        .unwrap();
    harness
        .raw
        .send(Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(root.join("site.cfg"))))
        .unwrap();

    assert_eq!(harness.next_relevant().await, DebounceMessage::RelevantChange);

    let mut relevant = harness.stop().await;
    assert!(relevant.try_recv().is_err(), "only the real edit counts");
}

#[tokio::test]
async fn test_removed_directory_leaves_watch_set() {
    let temp_dir = unique_temp_dir("loop_removed");
    let root = temp_dir.path().to_path_buf();
    fs::create_dir_all(root.join("A/B/C")).unwrap();
    let mut harness = Harness::start(&root);
    assert_eq!(harness.snapshot().await.len(), 4);

    fs::remove_dir_all(root.join("A/B")).unwrap();
    harness
        .raw
        .send(Ok(Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(root.join("A/B"))))
        .unwrap();
    harness.next_relevant().await;

    let watched = harness.snapshot().await;
    assert_eq!(watched, vec![root.clone(), root.join("A")]);

    harness.stop().await;
}

#[tokio::test]
async fn test_dump_command_is_served() {
    let temp_dir = unique_temp_dir("loop_dump");
    let harness = Harness::start(temp_dir.path());

    harness.control.send(TreeCommand::Dump).unwrap();
    // The loop keeps serving requests after a dump
    assert_eq!(harness.snapshot().await, vec![temp_dir.path().to_path_buf()]);

    harness.stop().await;
}

#[tokio::test]
async fn test_loop_exits_when_notifications_stop() {
    let temp_dir = unique_temp_dir("loop_closed");
    let harness = Harness::start(temp_dir.path());

    drop(harness.raw);
    tokio::time::timeout(Duration::from_secs(5), harness.task)
        .await
        .expect("event loop should stop")
        .unwrap();
}
