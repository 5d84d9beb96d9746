//! Tests for the debounce coordinator

use crate::marker::FailureMarker;
use crate::reconcile::{CycleOutcome, ReconcileCycle, RestartStatus};
use crate::tests::helpers::{ScriptedSupervisor, unique_temp_dir, wait_until};
use crate::watcher::{DebounceCoordinator, DebounceMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PERIOD: Duration = Duration::from_secs(60);

fn coordinator(supervisor: Arc<ScriptedSupervisor>, marker_dir: &tempfile::TempDir) -> DebounceCoordinator {
    let marker = FailureMarker::new(marker_dir.path().join("config_fail"));
    DebounceCoordinator::new(PERIOD, ReconcileCycle::new(supervisor, marker, false))
}

#[tokio::test]
async fn test_burst_coalesces_into_one_cycle() {
    let temp_dir = unique_temp_dir("debounce_burst");
    let supervisor = Arc::new(ScriptedSupervisor::default());
    let mut coordinator = coordinator(supervisor.clone(), &temp_dir);

    for _ in 0..25 {
        coordinator.record_change();
    }
    assert_eq!(coordinator.pending(), 25);

    let outcome = coordinator.on_tick().await;
    assert_eq!(
        outcome,
        Some(CycleOutcome::Applied {
            recovered: false,
            restart: RestartStatus::Restarted
        })
    );
    assert_eq!(coordinator.pending(), 0);
    assert_eq!(supervisor.validate_calls(), 1);
    assert_eq!(supervisor.restart_calls(), 1);

    // Nothing new: the next boundary is a heartbeat
    assert_eq!(coordinator.on_tick().await, None);
    assert_eq!(supervisor.validate_calls(), 1);
}

#[tokio::test]
async fn test_idle_period_runs_no_cycle() {
    let temp_dir = unique_temp_dir("debounce_idle");
    let supervisor = Arc::new(ScriptedSupervisor::default());
    let mut coordinator = coordinator(supervisor.clone(), &temp_dir);

    for _ in 0..3 {
        assert_eq!(coordinator.on_tick().await, None);
    }
    assert_eq!(supervisor.validate_calls(), 0);
    assert_eq!(supervisor.restart_calls(), 0);
}

#[tokio::test]
async fn test_failed_cycle_consumes_pending_changes() {
    let temp_dir = unique_temp_dir("debounce_failed");
    let supervisor = Arc::new(ScriptedSupervisor::failing_validation("bad config\n"));
    let mut coordinator = coordinator(supervisor.clone(), &temp_dir);

    coordinator.record_change();
    let outcome = coordinator.on_tick().await.unwrap();
    assert!(!outcome.is_valid());
    assert_eq!(coordinator.pending(), 0);

    // Broken config is not retried without another change
    assert_eq!(coordinator.on_tick().await, None);
    assert_eq!(supervisor.validate_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_waits_for_period_boundary() {
    let temp_dir = unique_temp_dir("debounce_run");
    let supervisor = Arc::new(ScriptedSupervisor::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(coordinator(supervisor.clone(), &temp_dir).run(rx, shutdown.clone()));

    for _ in 0..10 {
        tx.send(DebounceMessage::RelevantChange).unwrap();
    }

    tokio::time::sleep(PERIOD / 2).await;
    assert_eq!(supervisor.validate_calls(), 0, "no cycle before the first boundary");

    let sup = supervisor.clone();
    assert!(wait_until(PERIOD * 2, || {
        let sup = sup.clone();
        async move { sup.validate_calls() == 1 }
    })
    .await);

    // Quiet periods afterwards are heartbeats only
    tokio::time::sleep(PERIOD * 3).await;
    assert_eq!(supervisor.validate_calls(), 1);
    assert_eq!(supervisor.restart_calls(), 1);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cycles_never_overlap() {
    let temp_dir = unique_temp_dir("debounce_overlap");
    // Each call outlasts several periods
    let supervisor = Arc::new(ScriptedSupervisor::default().with_delay(PERIOD * 3));
    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(coordinator(supervisor.clone(), &temp_dir).run(rx, shutdown.clone()));

    let producer = tokio::spawn(async move {
        for _ in 0..60 {
            if tx.send(DebounceMessage::RelevantChange).is_err() {
                break;
            }
            tokio::time::sleep(PERIOD / 4).await;
        }
    });

    let sup = supervisor.clone();
    assert!(wait_until(PERIOD * 40, || {
        let sup = sup.clone();
        async move { sup.validate_calls() >= 2 }
    })
    .await);

    assert_eq!(supervisor.max_in_flight(), 1);
    let calls = supervisor.calls();
    assert_eq!(&calls[..3], &["validate", "restart", "validate"]);

    producer.await.unwrap();
    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_run_loop() {
    let temp_dir = unique_temp_dir("debounce_shutdown");
    let supervisor = Arc::new(ScriptedSupervisor::default());
    let (_tx, rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(coordinator(supervisor.clone(), &temp_dir).run(rx, shutdown.clone()));
    shutdown.cancel();

    tokio::time::timeout(PERIOD, task).await.unwrap().unwrap();
    assert_eq!(supervisor.validate_calls(), 0);
}
