//! Per-cycle refresh of query-level derived values.
//!
//! Stage, job and executor data move on every poll while a query's topology
//! does not, so query metrics, failure reason, resource usage and codegen
//! durations are recomputed here after the merge. Every value goes through an
//! equality gate; a query whose derived values did not move is returned as is.

use std::sync::Arc;

use crate::aggregate::{failure_reason, query_metric, JobRecord, StageRecord};
use crate::compile::{attach_durations, correlate_codegen};
use crate::model::{Query, Store};
use crate::resources::{resource_usage, ExecutorRecord, GlobalTotals};
use crate::reuse::{reuse_if_equal, same_arc, same_elements};
use crate::snapshot::QueryStatus;

#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    pub stages: &'a [StageRecord],
    pub jobs: Option<&'a [JobRecord]>,
    pub executors: &'a [ExecutorRecord],
    pub totals: GlobalTotals,
}

pub fn enrich_query(query: &Arc<Query>, ctx: &EnrichContext<'_>) -> Arc<Query> {
    let metrics = match ctx.jobs {
        Some(jobs) => Some(reuse_if_equal(
            query.metrics.as_ref(),
            query_metric(query.all_job_ids(), jobs),
        )),
        None => query.metrics.clone(),
    };
    let failure = match (query.status, ctx.jobs) {
        (QueryStatus::Failed, Some(jobs)) => failure_reason(&query.failed_job_ids, jobs, ctx.stages),
        _ => query.failure_reason.clone(),
    };
    let resources = if ctx.executors.is_empty() {
        query.resources.clone()
    } else {
        Some(reuse_if_equal(
            query.resources.as_ref(),
            resource_usage(
                query.submission_time_ms,
                query.duration_ms,
                metrics.as_ref().map_or(0, |m| m.run_time_ms),
                ctx.executors,
                ctx.totals,
            ),
        ))
    };
    let codegen = reuse_if_equal(Some(&query.codegen), correlate_codegen(&query.codegen, ctx.stages));
    let nodes = reuse_if_equal(
        Some(&query.nodes),
        attach_durations(&query.nodes, &codegen, metrics.as_ref().map(|m| m.run_time_ms)),
    );

    let nodes_changed = !Arc::ptr_eq(&nodes, &query.nodes);
    if !nodes_changed
        && Arc::ptr_eq(&codegen, &query.codegen)
        && same_arc(metrics.as_ref(), query.metrics.as_ref())
        && same_arc(resources.as_ref(), query.resources.as_ref())
        && failure == query.failure_reason
    {
        return Arc::clone(query);
    }

    Arc::new(Query {
        metric_revision: query.metric_revision + u64::from(nodes_changed),
        nodes,
        codegen,
        metrics,
        resources,
        failure_reason: failure,
        ..Query::clone(query)
    })
}

/// Enrich every query of `store`; returns `store` itself when nothing moved.
pub fn enrich_store(store: &Arc<Store>, ctx: &EnrichContext<'_>) -> Arc<Store> {
    let queries = store
        .queries
        .iter()
        .map(|q| enrich_query(q, ctx))
        .collect::<Vec<_>>();
    if same_elements(&store.queries, &queries) {
        Arc::clone(store)
    } else {
        Arc::new(Store { queries })
    }
}
