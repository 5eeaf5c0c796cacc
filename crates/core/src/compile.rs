//! Full recompute of one query from its polled snapshot.
//!
//! Pipeline: classify -> force an output node -> simplify -> project metrics
//! -> correlate codegen groups with stages -> attach durations.

use std::sync::Arc;
use std::time::Instant;

use planwatch_common::format::{parse_duration_ms, parse_timestamp_ms};
use planwatch_common::metrics::global_metrics;
use planwatch_common::Result;
use tracing::debug;

use crate::aggregate::{failure_reason, query_metric, JobRecord, StageRecord};
use crate::classify::{
    is_codegen_wrapper, is_plan_wrapper, metric_total, NodeClassifier, NodeMetricCalculator,
};
use crate::dag::simplify;
use crate::model::{CodegenEntry, Edge, Node, NodeType, Query, StageRef};
use crate::reuse::reuse_if_equal;
use crate::snapshot::{QuerySnapshot, QueryStatus, RawNode};

/// Name of the codegen wrapper metric holding the fused group's wall time.
const CODEGEN_DURATION_METRIC: &str = "duration";

/// Collaborators and the latest stage/job records a compile reads from.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub classifier: &'a dyn NodeClassifier,
    pub metrics: &'a dyn NodeMetricCalculator,
    pub stages: &'a [StageRecord],
    /// `None` until the job list has been polled at least once.
    pub jobs: Option<&'a [JobRecord]>,
}

/// Compile `snapshot` into a fresh [`Query`], continuing the revisions of `prior`.
pub fn compile_query(
    snapshot: &QuerySnapshot,
    prior: Option<&Query>,
    ctx: &CompileContext<'_>,
) -> Result<Query> {
    let started = Instant::now();
    let original_num_of_nodes = snapshot.nodes.len();

    let mut nodes = snapshot
        .nodes
        .iter()
        .map(|raw| classify_node(raw, ctx.classifier))
        .collect::<Vec<_>>();
    force_output_node(&mut nodes);

    let edges = snapshot
        .edges
        .iter()
        .map(|e| Edge {
            from_id: e.from_id,
            to_id: e.to_id,
        })
        .collect::<Vec<_>>();
    let (mut nodes, edges) = simplify(nodes, &edges);
    for node in &mut nodes {
        if let Some(raw) = snapshot.nodes.iter().find(|r| r.node_id == node.id) {
            node.metrics = ctx.metrics.project(node.node_type, &raw.metrics);
        }
    }

    let codegen = correlate_codegen(&codegen_entries(&snapshot.nodes)?, ctx.stages);
    let is_sql_command = snapshot.success_job_ids.is_empty()
        && snapshot.failed_job_ids.is_empty()
        && snapshot.running_job_ids.is_empty();

    let all_job_ids = snapshot
        .success_job_ids
        .iter()
        .chain(&snapshot.failed_job_ids)
        .chain(&snapshot.running_job_ids);
    let metrics = ctx.jobs.map(|jobs| {
        reuse_if_equal(
            prior.and_then(|p| p.metrics.as_ref()),
            query_metric(all_job_ids, jobs),
        )
    });
    let failure_reason = match (snapshot.status, ctx.jobs) {
        (QueryStatus::Failed, Some(jobs)) => {
            failure_reason(&snapshot.failed_job_ids, jobs, ctx.stages)
        }
        _ => None,
    };
    let nodes = attach_durations(&nodes, &codegen, metrics.as_ref().map(|m| m.run_time_ms));

    let shape_revision = prior.map_or(0, |p| p.shape_revision) + 1;
    let metric_revision = prior.map_or(0, |p| p.metric_revision) + 1;
    global_metrics().record_dag_simplified(original_num_of_nodes as u64, nodes.len() as u64);
    global_metrics().observe_phase("compile", started.elapsed().as_secs_f64());
    debug!(
        query_id = %snapshot.id,
        raw_nodes = original_num_of_nodes,
        visible_nodes = nodes.len(),
        shape_revision,
        operator = "QueryCompile",
        "query compiled"
    );

    Ok(Query {
        id: snapshot.id,
        status: snapshot.status,
        description: snapshot.description.clone(),
        submission_time_ms: parse_timestamp_ms(&snapshot.submission_time)?,
        duration_ms: snapshot.duration,
        success_job_ids: snapshot.success_job_ids.clone(),
        failed_job_ids: snapshot.failed_job_ids.clone(),
        running_job_ids: snapshot.running_job_ids.clone(),
        nodes: Arc::new(nodes),
        edges: Arc::new(edges),
        codegen: Arc::new(codegen),
        metrics,
        resources: prior.and_then(|p| p.resources.clone()),
        failure_reason,
        is_sql_command,
        original_num_of_nodes,
        shape_revision,
        metric_revision,
    })
}

fn classify_node(raw: &RawNode, classifier: &dyn NodeClassifier) -> Node {
    let classification = classifier.classify(&raw.node_name);
    Node {
        id: raw.node_id,
        raw_name: raw.node_name.clone(),
        node_type: classification.node_type,
        is_visible: classification.node_type != NodeType::Other,
        display_name: classification.display_name,
        codegen_group_id: raw.whole_stage_codegen_id,
        metrics: Vec::new(),
        stage: None,
        duration_ms: None,
        duration_percentage: None,
    }
}

/// Make sure the plan has a sink: the last non-wrapper node becomes the output.
fn force_output_node(nodes: &mut [Node]) {
    if nodes.iter().any(|n| n.node_type == NodeType::Output) {
        return;
    }
    if let Some(last) = nodes.iter_mut().rev().find(|n| !is_plan_wrapper(&n.raw_name)) {
        last.node_type = NodeType::Output;
        last.is_visible = true;
    }
}

/// Codegen wrapper nodes with their measured duration, in plan order.
pub fn codegen_entries(raw_nodes: &[RawNode]) -> Result<Vec<CodegenEntry>> {
    raw_nodes
        .iter()
        .filter(|raw| is_codegen_wrapper(&raw.node_name))
        .map(|raw| {
            let duration_ms = raw
                .metrics
                .iter()
                .find(|m| m.name == CODEGEN_DURATION_METRIC)
                .map(|m| parse_duration_ms(metric_total(&m.value)))
                .transpose()?;
            Ok(CodegenEntry {
                node_id: raw.node_id,
                raw_name: raw.node_name.clone(),
                codegen_group_id: raw.whole_stage_codegen_id,
                duration_ms,
                stage: None,
            })
        })
        .collect()
}

fn stage_ref(stage: &StageRecord) -> StageRef {
    StageRef {
        stage_id: stage.stage_id,
        status: stage.status,
        run_time_ms: stage.metrics.run_time_ms,
    }
}

/// Attach the stage whose operator names include each codegen wrapper's name.
pub fn correlate_codegen(entries: &[CodegenEntry], stages: &[StageRecord]) -> Vec<CodegenEntry> {
    entries
        .iter()
        .map(|entry| CodegenEntry {
            stage: stages
                .iter()
                .find(|stage| stage.operator_names.iter().any(|n| *n == entry.raw_name))
                .map(stage_ref),
            ..entry.clone()
        })
        .collect()
}

/// Resolve each node's duration from its codegen group, falling back to the stage run time.
pub fn attach_durations(
    nodes: &[Node],
    codegen: &[CodegenEntry],
    total_executor_run_time_ms: Option<u64>,
) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| {
            let entry = node.codegen_group_id.and_then(|group| {
                codegen.iter().find(|c| c.codegen_group_id == Some(group))
            });
            let stage = entry.and_then(|c| c.stage);
            let duration_ms = entry
                .and_then(|c| c.duration_ms)
                .or_else(|| stage.map(|s| s.run_time_ms as f64));
            let duration_percentage = match (duration_ms, total_executor_run_time_ms) {
                (Some(_), Some(0)) => Some(0.0),
                (Some(duration), Some(total)) => Some(duration / total as f64 * 100.0),
                _ => None,
            };
            Node {
                stage,
                duration_ms,
                duration_percentage,
                ..node.clone()
            }
        })
        .collect()
}
