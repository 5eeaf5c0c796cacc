//! Serialized poll loop over a [`DirectorySource`].
//!
//! At most one cycle batch is applied at a time; a tick that finds the
//! previous batch still running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use planwatch_common::metrics::global_metrics;
use planwatch_core::{AppState, Reconciler};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::render::render_summary;
use crate::replay::{read_cycle, DirectorySource};

#[derive(Debug)]
pub enum PollOutcome {
    /// A previous poll was still in flight.
    Busy,
    /// States produced by the cycles applied in this poll, oldest first.
    Applied(Vec<Arc<AppState>>),
}

#[derive(Debug)]
pub struct Poller {
    reconciler: Reconciler,
    source: Mutex<DirectorySource>,
    state: Mutex<Arc<AppState>>,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    pub fn new(reconciler: Reconciler, source: DirectorySource) -> Self {
        Self {
            reconciler,
            source: Mutex::new(source),
            state: Mutex::new(Arc::new(AppState::default())),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply every cycle file that appeared since the last poll.
    ///
    /// Unreadable or failing cycles are logged and skipped; the state stays at
    /// the last successfully applied cycle.
    pub fn poll_once(&self) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            global_metrics().record_poll_cycle("busy");
            return PollOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let files = {
            let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            match source.next_batch() {
                Ok(files) => files,
                Err(e) => {
                    warn!(dir = %source.dir().display(), error = %e, "failed to scan snapshot directory");
                    global_metrics().record_poll_cycle("failed");
                    return PollOutcome::Applied(Vec::new());
                }
            }
        };

        let mut applied = Vec::with_capacity(files.len());
        for path in files {
            let current = self.state();
            let next = read_cycle(&path).and_then(|cycle| self.reconciler.apply(&current, &cycle));
            match next {
                Ok(next) => {
                    debug!(file = %path.display(), changed = !Arc::ptr_eq(&current, &next), "cycle applied");
                    global_metrics().record_poll_cycle("applied");
                    *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
                    applied.push(next);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping poll cycle");
                    global_metrics().record_poll_cycle("failed");
                }
            }
        }
        PollOutcome::Applied(applied)
    }
}

fn print_outcome(outcome: PollOutcome) {
    match outcome {
        PollOutcome::Busy => debug!("previous poll still in flight, tick skipped"),
        PollOutcome::Applied(states) => {
            for state in states {
                print!("{}", render_summary(&state));
            }
        }
    }
}

/// Poll once and print every resulting state.
pub fn replay_once(poller: &Poller) {
    print_outcome(poller.poll_once());
}

/// Re-scan on every tick until the task is cancelled.
pub async fn watch(poller: Arc<Poller>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let poller = Arc::clone(&poller);
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || poller.poll_once()).await {
                Ok(outcome) => print_outcome(outcome),
                Err(e) => warn!(error = %e, "poll task failed"),
            }
        });
    }
}
