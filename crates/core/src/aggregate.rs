//! Stage/job/query counter aggregation.
//!
//! Skipped stages never reach an aggregate: [`stage_records`] drops them, and
//! every other function only sees records.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use planwatch_common::{JobId, StageId};
use serde::Serialize;

use crate::snapshot::{JobSnapshot, JobStatus, StageOperatorMap, StageSnapshot, StageStatus};

/// Canonical summed counters of one or more stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct StageMetric {
    pub run_time_ms: u64,
    pub bytes_spilled: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub shuffle_read_bytes: u64,
    pub shuffle_write_bytes: u64,
    pub total_tasks: u64,
}

impl Add for StageMetric {
    type Output = StageMetric;

    fn add(mut self, rhs: StageMetric) -> StageMetric {
        self += rhs;
        self
    }
}

impl AddAssign for StageMetric {
    fn add_assign(&mut self, rhs: StageMetric) {
        self.run_time_ms += rhs.run_time_ms;
        self.bytes_spilled += rhs.bytes_spilled;
        self.input_bytes += rhs.input_bytes;
        self.output_bytes += rhs.output_bytes;
        self.shuffle_read_bytes += rhs.shuffle_read_bytes;
        self.shuffle_write_bytes += rhs.shuffle_write_bytes;
        self.total_tasks += rhs.total_tasks;
    }
}

impl Sum for StageMetric {
    fn sum<I: Iterator<Item = StageMetric>>(iter: I) -> StageMetric {
        iter.fold(StageMetric::default(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a StageMetric> for StageMetric {
    fn sum<I: Iterator<Item = &'a StageMetric>>(iter: I) -> StageMetric {
        iter.copied().sum()
    }
}

impl From<&StageSnapshot> for StageMetric {
    fn from(stage: &StageSnapshot) -> Self {
        Self {
            run_time_ms: stage.executor_run_time,
            bytes_spilled: stage.disk_bytes_spilled,
            input_bytes: stage.input_bytes,
            output_bytes: stage.output_bytes,
            shuffle_read_bytes: stage.shuffle_read_bytes,
            shuffle_write_bytes: stage.shuffle_write_bytes,
            total_tasks: stage.num_tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage_id: StageId,
    pub name: String,
    pub status: StageStatus,
    pub num_tasks: u64,
    pub failure_reason: Option<String>,
    /// Operator names (rdd names) executed by this stage.
    pub operator_names: Vec<String>,
    pub metrics: StageMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub name: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub stage_ids: Vec<StageId>,
    pub metrics: StageMetric,
}

/// Map non-skipped stages to records carrying their canonical metric.
pub fn stage_records(stages: &[StageSnapshot], operators: &StageOperatorMap) -> Vec<StageRecord> {
    stages
        .iter()
        .filter(|stage| stage.status != StageStatus::Skipped)
        .map(|stage| StageRecord {
            stage_id: stage.stage_id,
            name: stage.name.clone(),
            status: stage.status,
            num_tasks: stage.num_tasks,
            failure_reason: stage.failure_reason.clone(),
            operator_names: operators
                .get(&stage.stage_id.0)
                .map(|names| names.values().cloned().collect())
                .unwrap_or_default(),
            metrics: StageMetric::from(stage),
        })
        .collect()
}

/// Sum of every record whose stage id is in `stage_ids`.
pub fn job_metric(stage_ids: &[StageId], stages: &[StageRecord]) -> StageMetric {
    stages
        .iter()
        .filter(|stage| stage_ids.contains(&stage.stage_id))
        .map(|stage| &stage.metrics)
        .sum()
}

pub fn job_records(jobs: &[JobSnapshot], stages: &[StageRecord]) -> Vec<JobRecord> {
    jobs.iter()
        .map(|job| JobRecord {
            job_id: job.job_id,
            name: job.name.clone(),
            description: job.description.clone(),
            status: job.status,
            stage_ids: job.stage_ids.clone(),
            metrics: job_metric(&job.stage_ids, stages),
        })
        .collect()
}

/// Sum of every job whose id is in `job_ids`.
pub fn query_metric<'a>(
    job_ids: impl IntoIterator<Item = &'a JobId>,
    jobs: &[JobRecord],
) -> StageMetric {
    let ids = job_ids.into_iter().collect::<Vec<_>>();
    jobs.iter()
        .filter(|job| ids.contains(&&job.job_id))
        .map(|job| &job.metrics)
        .sum()
}

/// Failure message of the first failed stage among the failed jobs' stages.
pub fn failure_reason(
    failed_job_ids: &[JobId],
    jobs: &[JobRecord],
    stages: &[StageRecord],
) -> Option<String> {
    let stage_ids = jobs
        .iter()
        .filter(|job| failed_job_ids.contains(&job.job_id))
        .flat_map(|job| job.stage_ids.iter().copied())
        .collect::<Vec<_>>();
    stages
        .iter()
        .filter(|stage| stage_ids.contains(&stage.stage_id))
        .find(|stage| stage.status == StageStatus::Failed)
        .and_then(|stage| stage.failure_reason.clone())
}
