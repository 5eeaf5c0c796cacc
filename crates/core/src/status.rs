//! Application-level task status derived from the latest stage list.

use std::sync::Arc;

use serde::Serialize;

use crate::reuse::reuse_if_equal;
use crate::snapshot::{StageSnapshot, StageStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Idle,
    Working,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub active_tasks: u64,
    /// Signed: retried tasks can push a stage's completed and failed counts past its task count.
    pub pending_tasks: i64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub activity: Activity,
}

/// Sum task counters over non-skipped stages, keeping `previous` when equal.
pub fn calculate_status(previous: Option<&Arc<Status>>, stages: &[StageSnapshot]) -> Arc<Status> {
    let live = stages.iter().filter(|s| s.status != StageStatus::Skipped);
    let mut status = Status {
        active_tasks: 0,
        pending_tasks: 0,
        input_bytes: 0,
        output_bytes: 0,
        activity: Activity::Idle,
    };
    for stage in live {
        status.active_tasks += stage.num_active_tasks;
        status.pending_tasks += stage.num_tasks as i64
            - stage.num_active_tasks as i64
            - stage.num_failed_tasks as i64
            - stage.num_complete_tasks as i64;
        status.input_bytes += stage.input_bytes;
        status.output_bytes += stage.output_bytes;
    }
    if status.active_tasks > 0 {
        status.activity = Activity::Working;
    }
    reuse_if_equal(previous, status)
}
