// cfgwatch - Debounced Config Watcher Library
//!
//! Watches a tree of service configuration files, coalesces bursts of edits,
//! validates the result and restarts the service only when it is valid. A
//! failed validation leaves a marker file until a later edit fixes it.

pub mod config;
pub mod error;
pub mod logging;
pub mod marker;
pub mod reconcile;
pub mod signals;
pub mod supervisor;
pub mod watcher;


// Re-export common types
pub use config::{CliArgs, Settings};
pub use marker::FailureMarker;
pub use reconcile::{CycleOutcome, CycleState, ReconcileCycle, RestartStatus};
pub use supervisor::{CommandReport, CommandSupervisor, ServiceSupervisor};
pub use watcher::{ConfigWatcher, WatcherHandle};
