//! Core-time accounting: query lifespans intersected with executor lifespans.

use planwatch_common::format::{ms_to_hours, parse_timestamp_ms};
use planwatch_common::Result;
use serde::Serialize;

use crate::model::ResourceUsage;
use crate::snapshot::ExecutorSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorRecord {
    pub id: String,
    pub cores: u64,
    pub add_time_ms: u64,
    /// `None` while the executor is still alive.
    pub end_time_ms: Option<u64>,
    pub is_driver: bool,
}

impl ExecutorRecord {
    pub fn from_snapshot(executor: &ExecutorSnapshot) -> Result<Self> {
        Ok(Self {
            id: executor.id.clone(),
            cores: executor.total_cores,
            add_time_ms: parse_timestamp_ms(&executor.add_time)?,
            end_time_ms: executor
                .remove_time
                .as_deref()
                .map(parse_timestamp_ms)
                .transpose()?,
            is_driver: executor.is_driver(),
        })
    }

    fn end_or(&self, open_end_ms: u64) -> u64 {
        self.end_time_ms.unwrap_or(open_end_ms)
    }
}

/// Application-wide totals the per-query percentages are relative to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalTotals {
    pub total_core_hours: Option<f64>,
    pub duration_ms: Option<u64>,
}

/// Executor-level summary of the application so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutorSummary {
    /// Non-driver executors; `0` means the driver runs everything (local mode).
    pub num_executors: usize,
    pub total_cores: u64,
    pub total_core_hours: f64,
    /// From the first executor activation to `now`.
    pub duration_ms: u64,
}

impl ExecutorSummary {
    pub fn totals(&self) -> GlobalTotals {
        GlobalTotals {
            total_core_hours: Some(self.total_core_hours),
            duration_ms: Some(self.duration_ms),
        }
    }
}

/// Length of the intersection of two half-open intervals, `0` when disjoint.
pub fn overlap_ms(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> u64 {
    a_end.min(b_end).saturating_sub(a_start.max(b_start))
}

/// Core-milliseconds the given executors were alive during `[start, end]`.
pub fn core_usage_ms<'a>(
    start_ms: u64,
    end_ms: u64,
    executors: impl IntoIterator<Item = &'a ExecutorRecord>,
) -> f64 {
    executors
        .into_iter()
        .map(|executor| {
            let overlap = overlap_ms(
                start_ms,
                end_ms,
                executor.add_time_ms,
                executor.end_or(u64::MAX),
            );
            overlap as f64 * executor.cores as f64
        })
        .sum()
}

fn capped_percentage(part: f64, whole: Option<f64>) -> f64 {
    match whole {
        Some(whole) if whole > 0.0 => (part / whole * 100.0).min(100.0),
        _ => 0.0,
    }
}

/// Resource usage of a query alive during `[submission, submission + duration]`.
pub fn resource_usage(
    submission_time_ms: u64,
    duration_ms: u64,
    total_executor_run_time_ms: u64,
    executors: &[ExecutorRecord],
    totals: GlobalTotals,
) -> ResourceUsage {
    let end_ms = submission_time_ms.saturating_add(duration_ms);
    let with_driver = core_usage_ms(submission_time_ms, end_ms, executors);
    let executors_only = if executors.len() == 1 {
        with_driver
    } else {
        core_usage_ms(
            submission_time_ms,
            end_ms,
            executors.iter().filter(|e| !e.is_driver),
        )
    };
    let activity_rate = capped_percentage(total_executor_run_time_ms as f64, Some(executors_only));
    let core_hour_usage = ms_to_hours(with_driver);

    ResourceUsage {
        resource_usage_with_driver_ms: with_driver,
        resource_usage_executors_only_ms: executors_only,
        core_hour_usage,
        activity_rate,
        core_hour_percentage: capped_percentage(core_hour_usage, totals.total_core_hours),
        duration_percentage: capped_percentage(
            duration_ms as f64,
            totals.duration_ms.map(|d| d as f64),
        ),
    }
}

/// Summarize executors as of `now_ms`; still-running executors count up to `now_ms`.
pub fn executor_summary(executors: &[ExecutorRecord], now_ms: u64) -> ExecutorSummary {
    let total_core_ms = executors
        .iter()
        .map(|e| e.end_or(now_ms).saturating_sub(e.add_time_ms) as f64 * e.cores as f64)
        .sum::<f64>();
    let started_ms = executors.iter().map(|e| e.add_time_ms).min();
    ExecutorSummary {
        num_executors: executors.iter().filter(|e| !e.is_driver).count(),
        total_cores: executors.iter().map(|e| e.cores).sum(),
        total_core_hours: ms_to_hours(total_core_ms),
        duration_ms: started_ms.map_or(0, |s| now_ms.saturating_sub(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(id: &str, cores: u64, add: u64, end: Option<u64>) -> ExecutorRecord {
        ExecutorRecord {
            id: id.to_string(),
            cores,
            add_time_ms: add,
            end_time_ms: end,
            is_driver: id == "driver",
        }
    }

    #[test]
    fn single_driver_covering_the_query() {
        let executors = vec![executor("driver", 4, 0, Some(10_000))];
        let usage = resource_usage(0, 10_000, 0, &executors, GlobalTotals::default());
        assert_eq!(usage.resource_usage_with_driver_ms, 40_000.0);
        assert_eq!(usage.resource_usage_executors_only_ms, 40_000.0);
        assert!((usage.core_hour_usage - 0.0111).abs() < 1e-4);
        assert_eq!(usage.core_hour_percentage, 0.0);
        assert_eq!(usage.duration_percentage, 0.0);
    }

    #[test]
    fn disjoint_and_contained_executor_ranges() {
        let disjoint = [executor("1", 8, 20_000, Some(30_000))];
        assert_eq!(core_usage_ms(0, 10_000, &disjoint), 0.0);

        let contained = [executor("1", 3, 2_000, Some(5_000))];
        assert_eq!(core_usage_ms(0, 10_000, &contained), 3_000.0 * 3.0);

        let open_ended = [executor("1", 2, 5_000, None)];
        assert_eq!(core_usage_ms(0, 10_000, &open_ended), 5_000.0 * 2.0);
    }

    #[test]
    fn activity_rate_excludes_driver_and_is_capped() {
        let executors = vec![
            executor("driver", 1, 0, None),
            executor("1", 2, 0, None),
            executor("2", 2, 0, None),
        ];
        let usage = resource_usage(0, 1_000, 2_000, &executors, GlobalTotals::default());
        assert_eq!(usage.resource_usage_with_driver_ms, 5_000.0);
        assert_eq!(usage.resource_usage_executors_only_ms, 4_000.0);
        assert_eq!(usage.activity_rate, 50.0);

        let busy = resource_usage(0, 1_000, 1_000_000, &executors, GlobalTotals::default());
        assert_eq!(busy.activity_rate, 100.0);

        let idle = resource_usage(0, 1_000, 500, &[], GlobalTotals::default());
        assert_eq!(idle.activity_rate, 0.0);
    }

    #[test]
    fn percentages_relative_to_global_totals() {
        let executors = vec![executor("driver", 4, 0, None)];
        let totals = GlobalTotals {
            total_core_hours: Some(ms_to_hours(80_000.0)),
            duration_ms: Some(40_000),
        };
        let usage = resource_usage(0, 10_000, 0, &executors, totals);
        assert!((usage.core_hour_percentage - 50.0).abs() < 1e-9);
        assert_eq!(usage.duration_percentage, 25.0);
    }

    #[test]
    fn summary_counts_running_executors_until_now() {
        let executors = vec![
            executor("driver", 1, 1_000, None),
            executor("1", 4, 2_000, Some(3_000)),
        ];
        let summary = executor_summary(&executors, 5_000);
        assert_eq!(summary.num_executors, 1);
        assert_eq!(summary.total_cores, 5);
        assert!((summary.total_core_hours - ms_to_hours(4_000.0 + 4_000.0)).abs() < 1e-12);
        assert_eq!(summary.duration_ms, 4_000);
    }
}
