//! Reconciled state handed to the rendering layer.
//!
//! Collections and derived records sit behind `Arc` so that a poll cycle which
//! does not touch a branch hands back the very same allocation.

use std::fmt;
use std::sync::Arc;

use planwatch_common::{JobId, NodeId, QueryId, StageId};
use serde::Serialize;

use crate::aggregate::StageMetric;
use crate::snapshot::{QueryStatus, StageStatus};

/// Semantic operator category produced by a [`crate::classify::NodeClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Input,
    Output,
    Transformation,
    Aggregate,
    Join,
    Shuffle,
    Broadcast,
    Sort,
    /// Catch-all for plumbing operators; never shown.
    Other,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Input => "input",
            NodeType::Output => "output",
            NodeType::Transformation => "transformation",
            NodeType::Aggregate => "aggregate",
            NodeType::Join => "join",
            NodeType::Shuffle => "shuffle",
            NodeType::Broadcast => "broadcast",
            NodeType::Sort => "sort",
            NodeType::Other => "other",
        };
        f.write_str(s)
    }
}

/// One display metric of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeMetric {
    pub name: String,
    pub value: String,
}

/// Summary of the stage a codegen group ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageRef {
    pub stage_id: StageId,
    pub status: StageStatus,
    pub run_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub raw_name: String,
    pub node_type: NodeType,
    pub is_visible: bool,
    pub display_name: String,
    pub codegen_group_id: Option<u64>,
    pub metrics: Vec<NodeMetric>,
    pub stage: Option<StageRef>,
    pub duration_ms: Option<f64>,
    pub duration_percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from_id: NodeId,
    pub to_id: NodeId,
}

/// A whole-stage codegen wrapper: one measured duration for a fused node group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodegenEntry {
    pub node_id: NodeId,
    pub raw_name: String,
    pub codegen_group_id: Option<u64>,
    pub duration_ms: Option<f64>,
    pub stage: Option<StageRef>,
}

/// Resource consumption of one query, derived from executor lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Core-milliseconds including the driver.
    pub resource_usage_with_driver_ms: f64,
    /// Core-milliseconds of non-driver executors (or the single executor).
    pub resource_usage_executors_only_ms: f64,
    pub core_hour_usage: f64,
    /// Busy share of available executor cores, in `[0, 100]`.
    pub activity_rate: f64,
    pub core_hour_percentage: f64,
    pub duration_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub id: QueryId,
    pub status: QueryStatus,
    pub description: String,
    pub submission_time_ms: u64,
    pub duration_ms: u64,
    pub success_job_ids: Vec<JobId>,
    pub failed_job_ids: Vec<JobId>,
    pub running_job_ids: Vec<JobId>,
    pub nodes: Arc<Vec<Node>>,
    pub edges: Arc<Vec<Edge>>,
    pub codegen: Arc<Vec<CodegenEntry>>,
    pub metrics: Option<Arc<StageMetric>>,
    pub resources: Option<Arc<ResourceUsage>>,
    pub failure_reason: Option<String>,
    /// No job was ever spawned: a metadata-only command.
    pub is_sql_command: bool,
    /// Node count before simplification, compared against the next poll.
    pub original_num_of_nodes: usize,
    /// Bumped on every full compile.
    pub shape_revision: u64,
    /// Bumped on every full compile and every change to per-node values.
    pub metric_revision: u64,
}

impl Query {
    pub fn all_job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.success_job_ids
            .iter()
            .chain(&self.failed_job_ids)
            .chain(&self.running_job_ids)
    }

    pub fn total_executor_run_time_ms(&self) -> Option<u64> {
        self.metrics.as_ref().map(|m| m.run_time_ms)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_visible)
    }
}

/// Ordered query list; position is expected to follow the numeric id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Store {
    pub queries: Vec<Arc<Query>>,
}

impl Store {
    pub fn get(&self, id: QueryId) -> Option<&Arc<Query>> {
        self.queries.iter().find(|q| q.id == id)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
