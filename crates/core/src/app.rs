//! Application-state reducer: folds one poll cycle into the previous state.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use planwatch_common::format::parse_timestamp_ms;
use planwatch_common::metrics::global_metrics;
use planwatch_common::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{job_records, stage_records, JobRecord, StageRecord};
use crate::classify::{DefaultMetricCalculator, NodeClassifier, NodeMetricCalculator, TableClassifier};
use crate::compile::CompileContext;
use crate::enrich::{enrich_store, EnrichContext};
use crate::merge::{merge, update_node_metrics};
use crate::model::Store;
use crate::resources::{executor_summary, ExecutorRecord, ExecutorSummary};
use crate::reuse::{reuse_if_equal, same_arc};
use crate::snapshot::{AppSnapshot, PollCycle};
use crate::status::{calculate_status, Status};

/// Spark properties surfaced in [`AppDetails::config`], in display order.
const SPARK_CONFIG_KEYS: &[&str] = &["spark.app.name", "spark.app.id", "spark.master"];
const SYSTEM_CONFIG_KEYS: &[&str] = &["sun.java.command"];
const RUNTIME_CONFIG_KEYS: &[&str] = &["javaVersion", "scalaVersion"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDetails {
    pub app_id: String,
    pub app_name: Option<String>,
    pub engine_version: String,
    pub config: Vec<(String, String)>,
}

fn pick(props: &[(String, String)], keys: &[&str]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| props.iter().find(|(k, _)| k == *key).cloned())
        .collect()
}

impl AppDetails {
    pub fn from_snapshot(app: &AppSnapshot) -> Self {
        let mut config = pick(&app.spark_properties, SPARK_CONFIG_KEYS);
        config.extend(pick(&app.system_properties, SYSTEM_CONFIG_KEYS));
        config.extend(RUNTIME_CONFIG_KEYS.iter().filter_map(|key| {
            app.runtime
                .get(*key)
                .map(|v| ((*key).to_string(), v.clone()))
        }));
        Self {
            app_id: app.app_id.clone(),
            app_name: config
                .iter()
                .find(|(k, _)| k == "spark.app.name")
                .map(|(_, v)| v.clone()),
            engine_version: app.engine_version.clone(),
            config,
        }
    }
}

/// Everything the dashboard renders. Each branch is shared until it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub app: Option<Arc<AppDetails>>,
    pub status: Option<Arc<Status>>,
    pub executors: Option<Arc<Vec<ExecutorRecord>>>,
    pub executor_summary: Option<Arc<ExecutorSummary>>,
    pub stages: Option<Arc<Vec<StageRecord>>>,
    pub jobs: Option<Arc<Vec<JobRecord>>>,
    pub store: Option<Arc<Store>>,
}

impl AppState {
    fn same_branches(&self, other: &AppState) -> bool {
        same_arc(self.app.as_ref(), other.app.as_ref())
            && same_arc(self.status.as_ref(), other.status.as_ref())
            && same_arc(self.executors.as_ref(), other.executors.as_ref())
            && same_arc(self.executor_summary.as_ref(), other.executor_summary.as_ref())
            && same_arc(self.stages.as_ref(), other.stages.as_ref())
            && same_arc(self.jobs.as_ref(), other.jobs.as_ref())
            && same_arc(self.store.as_ref(), other.store.as_ref())
    }
}

/// Folds poll cycles into [`AppState`] using the configured classifier and metric projection.
#[derive(Debug, Clone)]
pub struct Reconciler {
    classifier: Arc<dyn NodeClassifier>,
    metrics: Arc<dyn NodeMetricCalculator>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Arc::new(TableClassifier), Arc::new(DefaultMetricCalculator))
    }
}

impl Reconciler {
    pub fn new(classifier: Arc<dyn NodeClassifier>, metrics: Arc<dyn NodeMetricCalculator>) -> Self {
        Self {
            classifier,
            metrics,
        }
    }

    /// Apply one cycle. Lists absent from the cycle (empty) keep their previous
    /// value; a cycle that changes nothing returns `state` itself.
    pub fn apply(&self, state: &Arc<AppState>, cycle: &PollCycle) -> Result<Arc<AppState>> {
        let started = Instant::now();
        let now_ms = match cycle.captured_at.as_deref() {
            Some(ts) => parse_timestamp_ms(ts)?,
            None => wall_clock_ms(),
        };

        let app = match (&state.app, &cycle.app) {
            (None, Some(snapshot)) => {
                let details = AppDetails::from_snapshot(snapshot);
                info!(
                    app_id = %details.app_id,
                    engine_version = %details.engine_version,
                    "application detected"
                );
                Some(Arc::new(details))
            }
            _ => state.app.clone(),
        };

        let (status, stages) = if cycle.stages.is_empty() {
            (state.status.clone(), state.stages.clone())
        } else {
            (
                Some(calculate_status(state.status.as_ref(), &cycle.stages)),
                Some(reuse_if_equal(
                    state.stages.as_ref(),
                    stage_records(&cycle.stages, &cycle.stage_operators),
                )),
            )
        };
        let stage_slice: &[StageRecord] = stages.as_deref().map(Vec::as_slice).unwrap_or_default();

        let executors = if cycle.executors.is_empty() {
            state.executors.clone()
        } else {
            let records = cycle
                .executors
                .iter()
                .map(ExecutorRecord::from_snapshot)
                .collect::<Result<Vec<_>>>()?;
            Some(reuse_if_equal(state.executors.as_ref(), records))
        };
        let executor_slice: &[ExecutorRecord] =
            executors.as_deref().map(Vec::as_slice).unwrap_or_default();
        let summary = executors.as_ref().map(|records| {
            reuse_if_equal(
                state.executor_summary.as_ref(),
                executor_summary(records, now_ms),
            )
        });

        let jobs = if cycle.jobs.is_empty() {
            state.jobs.clone()
        } else {
            Some(reuse_if_equal(
                state.jobs.as_ref(),
                job_records(&cycle.jobs, stage_slice),
            ))
        };
        let job_slice: Option<&[JobRecord]> = jobs.as_deref().map(Vec::as_slice);

        let compile_ctx = CompileContext {
            classifier: self.classifier.as_ref(),
            metrics: self.metrics.as_ref(),
            stages: stage_slice,
            jobs: job_slice,
        };
        let mut store = if cycle.queries.is_empty() {
            state.store.clone()
        } else {
            let merge_started = Instant::now();
            let merged = merge(state.store.as_ref(), &cycle.queries, &compile_ctx)?;
            global_metrics().observe_phase("merge", merge_started.elapsed().as_secs_f64());
            Some(merged)
        };
        if let Some(update) = &cycle.node_metrics {
            store = store.map(|s| update_node_metrics(&s, update, self.metrics.as_ref()));
        }
        let enrich_ctx = EnrichContext {
            stages: stage_slice,
            jobs: job_slice,
            executors: executor_slice,
            totals: summary.as_deref().map(ExecutorSummary::totals).unwrap_or_default(),
        };
        let store = store.map(|s| enrich_store(&s, &enrich_ctx));

        let next = AppState {
            app,
            status,
            executors,
            executor_summary: summary,
            stages,
            jobs,
            store,
        };

        let metrics = global_metrics();
        metrics.observe_phase("apply", started.elapsed().as_secs_f64());
        if next.same_branches(state) {
            debug!(operator = "Reconcile", "cycle left state unchanged");
            return Ok(Arc::clone(state));
        }
        if let Some(status) = &next.status {
            metrics.set_task_status(status.active_tasks, status.pending_tasks);
        }
        let num_queries = next.store.as_ref().map_or(0, |s| s.len());
        metrics.set_store_queries(num_queries as u64);
        debug!(
            operator = "Reconcile",
            queries = num_queries,
            executors = next.executors.as_ref().map_or(0, |e| e.len()),
            "cycle applied"
        );
        Ok(Arc::new(next))
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
