//! Snapshot merger: decides per query between a full compile and a shallow update.

use std::sync::Arc;

use planwatch_common::metrics::global_metrics;
use planwatch_common::Result;
use tracing::debug;

use crate::classify::NodeMetricCalculator;
use crate::compile::{compile_query, CompileContext};
use crate::model::{Node, Query, Store};
use crate::reuse::same_elements;
use crate::snapshot::{NodeMetricsUpdate, QuerySnapshot};

/// Why a query was (or was not) recompiled in a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// First time this id is seen.
    New,
    /// Reported as completed or failed.
    Terminal,
    /// Node count changed while running.
    Restructured,
    /// Live fields refreshed, topology kept.
    Shallow,
    /// Nothing changed; the previous entry is kept as is.
    Retained,
}

impl MergeDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeDecision::New => "new",
            MergeDecision::Terminal => "terminal",
            MergeDecision::Restructured => "restructured",
            MergeDecision::Shallow => "shallow",
            MergeDecision::Retained => "retained",
        }
    }
}

/// Merge the polled query list into the previous store.
///
/// Entries of `previous` at positions below the smallest incoming id are kept
/// untouched; everything from that position on is rebuilt from `incoming` in
/// server order. Returns `previous` itself when no entry changed.
pub fn merge(
    previous: Option<&Arc<Store>>,
    incoming: &[QuerySnapshot],
    ctx: &CompileContext<'_>,
) -> Result<Arc<Store>> {
    let Some(min_id) = incoming.iter().map(|q| q.id.0).min() else {
        return Ok(previous.cloned().unwrap_or_default());
    };

    let mut queries = match previous {
        Some(prev) => {
            let keep = usize::try_from(min_id).map_or(prev.len(), |id| id.min(prev.len()));
            prev.queries[..keep].to_vec()
        }
        None => Vec::with_capacity(incoming.len()),
    };

    for snapshot in incoming {
        let prior = previous.and_then(|p| p.get(snapshot.id));
        let (query, decision) = merge_one(snapshot, prior, ctx)?;
        debug!(
            query_id = %snapshot.id,
            decision = decision.as_str(),
            operator = "SnapshotMerge",
            "merged query"
        );
        global_metrics().record_reconcile_decision(decision.as_str());
        queries.push(query);
    }

    match previous {
        Some(prev) if same_elements(&prev.queries, &queries) => Ok(Arc::clone(prev)),
        _ => Ok(Arc::new(Store { queries })),
    }
}

fn merge_one(
    snapshot: &QuerySnapshot,
    prior: Option<&Arc<Query>>,
    ctx: &CompileContext<'_>,
) -> Result<(Arc<Query>, MergeDecision)> {
    let Some(prior) = prior else {
        let query = compile_query(snapshot, None, ctx)?;
        return Ok((Arc::new(query), MergeDecision::New));
    };

    let decision = if snapshot.status.is_terminal() {
        MergeDecision::Terminal
    } else if snapshot.nodes.len() != prior.original_num_of_nodes {
        MergeDecision::Restructured
    } else {
        return Ok(shallow_update(snapshot, prior));
    };

    let compiled = compile_query(snapshot, Some(prior), ctx)?;
    // Finished queries are reported every cycle; an identical recompile keeps the entry.
    if same_content(&compiled, prior) {
        return Ok((Arc::clone(prior), MergeDecision::Retained));
    }
    Ok((Arc::new(compiled), decision))
}

fn same_content(compiled: &Query, prior: &Query) -> bool {
    let mut normalized = compiled.clone();
    normalized.shape_revision = prior.shape_revision;
    normalized.metric_revision = prior.metric_revision;
    normalized == *prior
}

/// Overwrite only the live scalar fields of a running query.
fn shallow_update(snapshot: &QuerySnapshot, prior: &Arc<Query>) -> (Arc<Query>, MergeDecision) {
    if prior.status == snapshot.status
        && prior.duration_ms == snapshot.duration
        && prior.success_job_ids == snapshot.success_job_ids
        && prior.failed_job_ids == snapshot.failed_job_ids
        && prior.running_job_ids == snapshot.running_job_ids
    {
        return (Arc::clone(prior), MergeDecision::Retained);
    }
    let updated = Query {
        status: snapshot.status,
        duration_ms: snapshot.duration,
        success_job_ids: snapshot.success_job_ids.clone(),
        failed_job_ids: snapshot.failed_job_ids.clone(),
        running_job_ids: snapshot.running_job_ids.clone(),
        ..Query::clone(prior)
    };
    (Arc::new(updated), MergeDecision::Shallow)
}

/// Apply live per-node metrics to one query, keeping its position in the store.
///
/// Only `metric_revision` moves; an update for an unknown query, or one that
/// changes no value, returns `store` itself.
pub fn update_node_metrics(
    store: &Arc<Store>,
    update: &NodeMetricsUpdate,
    calculator: &dyn NodeMetricCalculator,
) -> Arc<Store> {
    let Some(position) = store.queries.iter().position(|q| q.id == update.query_id) else {
        debug!(query_id = %update.query_id, "node metrics for unknown query ignored");
        return Arc::clone(store);
    };
    let query = &store.queries[position];
    let nodes = query
        .nodes
        .iter()
        .map(|node| match update.nodes.iter().find(|entry| entry.id == node.id) {
            Some(entry) => Node {
                metrics: calculator.project(node.node_type, &entry.metrics),
                ..node.clone()
            },
            None => node.clone(),
        })
        .collect::<Vec<_>>();
    if nodes == *query.nodes {
        return Arc::clone(store);
    }

    let updated = Query {
        nodes: Arc::new(nodes),
        metric_revision: query.metric_revision + 1,
        ..Query::clone(query)
    };
    let mut queries = store.queries.clone();
    queries[position] = Arc::new(updated);
    Arc::new(Store { queries })
}
