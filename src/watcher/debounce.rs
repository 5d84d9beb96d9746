//! Debounce coordinator
//!
//! Relevant changes only bump a counter. A fixed-period timer drains it: a
//! nonzero count at a period boundary runs exactly one reconcile cycle, a zero
//! count does nothing. Cycles run inline on this task, so a second cycle can
//! never start while one is in flight.

use crate::reconcile::{CycleOutcome, ReconcileCycle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Message from the file system event task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceMessage {
    RelevantChange,
}

pub struct DebounceCoordinator {
    period: Duration,
    pending: u64,
    cycle: ReconcileCycle,
}

impl DebounceCoordinator {
    pub fn new(period: Duration, cycle: ReconcileCycle) -> Self {
        Self {
            period,
            pending: 0,
            cycle,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Relevant changes seen since the last cycle.
    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn cycle(&self) -> &ReconcileCycle {
        &self.cycle
    }

    pub fn record_change(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    /// Period boundary: run one cycle if anything is pending.
    pub async fn on_tick(&mut self) -> Option<CycleOutcome> {
        if self.pending == 0 {
            return None;
        }

        let batch = std::mem::take(&mut self.pending);
        info!("📦 Processing {} pending change(s)", batch);
        let outcome = self.cycle.run().await;
        debug!("Cycle finished: {:?}", outcome);
        Some(outcome)
    }

    /// Drive the coordinator until `shutdown` is cancelled.
    pub async fn run(
        mut self,
        mut changes: mpsc::UnboundedReceiver<DebounceMessage>,
        shutdown: CancellationToken,
    ) {
        // First boundary is one full period away, like a plain ticker.
        let mut tick = interval_at(Instant::now() + self.period, self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut changes_open = true;

        info!("🔄 Debounce coordinator started (period {:?})", self.period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = changes.recv(), if changes_open => match msg {
                    Some(DebounceMessage::RelevantChange) => self.record_change(),
                    None => {
                        debug!("Change channel closed");
                        changes_open = false;
                    }
                },
                _ = tick.tick() => {
                    self.on_tick().await;
                }
            }
        }
        info!("Debounce coordinator stopped");
    }
}
