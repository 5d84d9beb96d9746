//! Tests for failure marker persistence

use crate::error::MarkerError;
use crate::marker::FailureMarker;
use crate::tests::helpers::unique_temp_dir;

#[tokio::test]
async fn test_write_exists_remove() {
    let temp_dir = unique_temp_dir("marker_basic");
    let marker = FailureMarker::new(temp_dir.path().join("nagios_config_fail"));

    assert!(!marker.exists().await.unwrap());

    marker.write(b"Total Errors: 1\n").await.unwrap();
    assert!(marker.exists().await.unwrap());
    assert_eq!(std::fs::read(marker.path()).unwrap(), b"Total Errors: 1\n");

    assert!(marker.remove().await.unwrap());
    assert!(!marker.exists().await.unwrap());
}

#[tokio::test]
async fn test_remove_without_marker_is_noop() {
    let temp_dir = unique_temp_dir("marker_absent");
    let marker = FailureMarker::new(temp_dir.path().join("nagios_config_fail"));

    assert!(!marker.remove().await.unwrap());
}

#[tokio::test]
async fn test_marker_survives_new_instance() {
    let temp_dir = unique_temp_dir("marker_durable");
    let path = temp_dir.path().join("nagios_config_fail");

    FailureMarker::new(&path).write(b"broken").await.unwrap();

    // A later process sees the same state
    let reopened = FailureMarker::new(&path);
    assert!(reopened.exists().await.unwrap());
}

#[tokio::test]
async fn test_write_into_missing_directory_fails() {
    let temp_dir = unique_temp_dir("marker_missing_dir");
    let marker = FailureMarker::new(temp_dir.path().join("nope").join("fail"));

    let err = marker.write(b"x").await.unwrap_err();
    assert!(err.to_string().contains("Failed to write failure marker"));
}

#[tokio::test]
async fn test_stat_failure_is_reported() {
    let temp_dir = unique_temp_dir("marker_stat");
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let marker = FailureMarker::new(blocker.join("nagios_config_fail"));

    // A file in the parent position gives ENOTDIR, even for root
    let err = marker.exists().await.unwrap_err();
    assert!(matches!(err, MarkerError::Stat { .. }));
    assert!(err.to_string().contains("Failed to check failure marker"));
}
