//! Reconcile cycle: validate → (apply | record) → idle
//!
//! One cycle runs per debounce period with pending changes. The cycle never
//! gets stuck: every entry into `Validating` ends back in `Idle` after one
//! validate call and at most one restart call, both bounded by the
//! supervisor's timeout.

use crate::error::CommandError;
use crate::marker::FailureMarker;
use crate::supervisor::ServiceSupervisor;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Validating,
    Applying,
    Recording,
}

/// What happened to the restart in a cycle whose validation passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStatus {
    Restarted,
    /// Dry-run mode
    Skipped,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Validation passed. `recovered` is true when a failure marker was cleared.
    Applied {
        recovered: bool,
        restart: RestartStatus,
    },
    /// Validation failed (or timed out) and the diagnostic was recorded.
    Recorded { timed_out: bool, marker_written: bool },
}

impl CycleOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, CycleOutcome::Applied { .. })
    }
}

enum Verdict {
    Valid,
    Invalid { diagnostic: Vec<u8>, timed_out: bool },
}

pub struct ReconcileCycle {
    supervisor: Arc<dyn ServiceSupervisor>,
    marker: FailureMarker,
    dry_run: bool,
    state: CycleState,
}

impl ReconcileCycle {
    pub fn new(supervisor: Arc<dyn ServiceSupervisor>, marker: FailureMarker, dry_run: bool) -> Self {
        Self {
            supervisor,
            marker,
            dry_run,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn marker(&self) -> &FailureMarker {
        &self.marker
    }

    /// Run one full cycle and return to `Idle`.
    pub async fn run(&mut self) -> CycleOutcome {
        self.transition(CycleState::Validating);
        info!("🔍 Testing config");

        let outcome = match self.validate().await {
            Verdict::Valid => {
                let recovered = self.clear_marker().await;
                self.transition(CycleState::Applying);
                let restart = self.apply().await;
                CycleOutcome::Applied { recovered, restart }
            }
            Verdict::Invalid {
                diagnostic,
                timed_out,
            } => {
                self.transition(CycleState::Recording);
                let marker_written = self.record(&diagnostic).await;
                CycleOutcome::Recorded {
                    timed_out,
                    marker_written,
                }
            }
        };

        self.transition(CycleState::Idle);
        outcome
    }

    fn transition(&mut self, next: CycleState) {
        debug!("Reconcile cycle: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn validate(&self) -> Verdict {
        match self.supervisor.validate().await {
            Ok(report) if report.ok => Verdict::Valid,
            Ok(report) => Verdict::Invalid {
                diagnostic: report.output,
                timed_out: false,
            },
            Err(e @ CommandError::Timeout { .. }) => Verdict::Invalid {
                diagnostic: format!("validation timed out: {}\n", e).into_bytes(),
                timed_out: true,
            },
            Err(e) => Verdict::Invalid {
                diagnostic: format!("validation could not run: {}\n", e).into_bytes(),
                timed_out: false,
            },
        }
    }

    /// Remove a marker left by an earlier failure. Returns true on recovery.
    async fn clear_marker(&self) -> bool {
        match self.marker.exists().await {
            Ok(false) => return false,
            Ok(true) => {}
            // Removal still runs; a missing file is a no-op there.
            Err(e) => warn!("{}", e),
        }

        match self.marker.remove().await {
            Ok(true) => {
                info!("✅ Config has recovered");
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Failed to clean up failure marker: {}", e);
                false
            }
        }
    }

    async fn apply(&self) -> RestartStatus {
        if self.dry_run {
            info!("Dry run: skipping service restart");
            return RestartStatus::Skipped;
        }

        info!("🔄 Restarting service");
        match self.supervisor.restart().await {
            Ok(report) if report.ok => {
                debug!("Restart output: {}", report.output_lossy());
                RestartStatus::Restarted
            }
            Ok(report) => {
                error!("Failed to restart service:\n{}", report.output_lossy());
                RestartStatus::Failed
            }
            Err(e @ CommandError::Timeout { .. }) => {
                error!("Failed to restart service: {}", e);
                RestartStatus::TimedOut
            }
            Err(e) => {
                error!("Failed to restart service: {}", e);
                RestartStatus::Failed
            }
        }
    }

    async fn record(&self, diagnostic: &[u8]) -> bool {
        error!(
            "❌ Config is broken!\n\n{}",
            String::from_utf8_lossy(diagnostic)
        );
        match self.marker.write(diagnostic).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}
