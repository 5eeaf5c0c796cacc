//! Wire shapes of one poll cycle, as served by the engine's status endpoints.
//!
//! Every shape is decoded leniently: counters the server may omit default to
//! zero and optional strings to `None`. Nothing here is validated beyond that.

use std::collections::BTreeMap;

use planwatch_common::{JobId, NodeId, QueryId, StageId};
use serde::{Deserialize, Serialize};

/// Stage lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Active,
    Complete,
    Pending,
    Failed,
    /// Stage reused from an earlier job; its counters are not meaningful.
    Skipped,
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Query lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Running,
    Completed,
    Failed,
}

impl QueryStatus {
    /// Completed and failed queries will not change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    pub stage_id: StageId,
    #[serde(default)]
    pub attempt_id: u32,
    pub status: StageStatus,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num_tasks: u64,
    #[serde(default)]
    pub num_active_tasks: u64,
    #[serde(default)]
    pub num_failed_tasks: u64,
    #[serde(default)]
    pub num_complete_tasks: u64,
    #[serde(default)]
    pub executor_run_time: u64,
    #[serde(default)]
    pub disk_bytes_spilled: u64,
    #[serde(default)]
    pub input_bytes: u64,
    #[serde(default)]
    pub output_bytes: u64,
    #[serde(default)]
    pub shuffle_read_bytes: u64,
    #[serde(default)]
    pub shuffle_write_bytes: u64,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Stage id -> (rdd id -> operator name) as served next to the stage list.
pub type StageOperatorMap = BTreeMap<u64, BTreeMap<u64, String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub stage_ids: Vec<StageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSnapshot {
    pub id: String,
    #[serde(default)]
    pub total_cores: u64,
    pub add_time: String,
    #[serde(default)]
    pub remove_time: Option<String>,
}

impl ExecutorSnapshot {
    pub fn is_driver(&self) -> bool {
        self.id == "driver"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetric {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    pub node_id: NodeId,
    pub node_name: String,
    #[serde(default)]
    pub whole_stage_codegen_id: Option<u64>,
    #[serde(default)]
    pub metrics: Vec<RawMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    pub from_id: NodeId,
    pub to_id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySnapshot {
    #[serde(with = "numeric_string")]
    pub id: QueryId,
    pub status: QueryStatus,
    #[serde(default)]
    pub description: String,
    pub submission_time: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub success_job_ids: Vec<JobId>,
    #[serde(default)]
    pub failed_job_ids: Vec<JobId>,
    #[serde(default)]
    pub running_job_ids: Vec<JobId>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

/// Live per-node metrics for one running query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetricsUpdate {
    #[serde(with = "numeric_string")]
    pub query_id: QueryId,
    pub nodes: Vec<NodeMetricsEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetricsEntry {
    pub id: NodeId,
    #[serde(default)]
    pub metrics: Vec<RawMetric>,
}

/// Application attempt info and environment, fetched once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub app_id: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub spark_properties: Vec<(String, String)>,
    #[serde(default)]
    pub system_properties: Vec<(String, String)>,
    #[serde(default)]
    pub runtime: BTreeMap<String, String>,
}

/// Everything fetched in one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCycle {
    /// Engine timestamp of the fetch; the reconciler falls back to the wall clock.
    #[serde(default)]
    pub captured_at: Option<String>,
    #[serde(default)]
    pub app: Option<AppSnapshot>,
    #[serde(default)]
    pub stages: Vec<StageSnapshot>,
    #[serde(default)]
    pub stage_operators: StageOperatorMap,
    #[serde(default)]
    pub executors: Vec<ExecutorSnapshot>,
    #[serde(default)]
    pub jobs: Vec<JobSnapshot>,
    #[serde(default)]
    pub queries: Vec<QuerySnapshot>,
    #[serde(default)]
    pub node_metrics: Option<NodeMetricsUpdate>,
}

/// Query ids travel as numeric strings (`"12"`); plain numbers are accepted too.
mod numeric_string {
    use planwatch_common::QueryId;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(id: &QueryId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QueryId, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(QueryId(n)),
            Repr::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(QueryId)
                .map_err(|e| de::Error::custom(format!("invalid query id '{s}': {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query_with_string_id_and_defaults() {
        let raw = r#"{
            "id": "7",
            "status": "RUNNING",
            "submissionTime": "2024-01-01T00:00:00.000GMT",
            "duration": 1200,
            "nodes": [{"nodeId": 0, "nodeName": "Scan parquet", "metrics": [{"name": "number of output rows", "value": "10"}]}],
            "edges": []
        }"#;
        let q: QuerySnapshot = serde_json::from_str(raw).expect("decode");
        assert_eq!(q.id, QueryId(7));
        assert!(q.success_job_ids.is_empty());
        assert_eq!(q.nodes[0].whole_stage_codegen_id, None);
        assert!(!q.status.is_terminal());
    }

    #[test]
    fn decodes_stage_counters_leniently() {
        let raw = r#"{"stageId": 3, "status": "SKIPPED", "numTasks": 4}"#;
        let s: StageSnapshot = serde_json::from_str(raw).expect("decode");
        assert_eq!(s.status, StageStatus::Skipped);
        assert_eq!(s.executor_run_time, 0);
        assert_eq!(s.failure_reason, None);
    }

    #[test]
    fn unknown_job_status_maps_to_unknown() {
        let raw = r#"{"jobId": 1, "status": "QUEUED", "stageIds": [1, 2]}"#;
        let j: JobSnapshot = serde_json::from_str(raw).expect("decode");
        assert_eq!(j.status, JobStatus::Unknown);
        assert_eq!(j.stage_ids, vec![StageId(1), StageId(2)]);
    }
}
