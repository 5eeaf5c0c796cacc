//! Operator classification and per-node metric projection.
//!
//! Both are seams: the compiler only talks to [`NodeClassifier`] and
//! [`NodeMetricCalculator`]. The table-driven implementations here cover the
//! operator names the engine emits today.

use std::fmt::Debug;

use crate::model::{NodeMetric, NodeType};
use crate::snapshot::RawMetric;

/// Plan-wrapper node names that never become the forced output node.
pub const ADAPTIVE_PLAN_ROOT: &str = "AdaptiveSparkPlan";
pub const CODEGEN_WRAPPER: &str = "WholeStageCodegen";

pub fn is_plan_wrapper(raw_name: &str) -> bool {
    raw_name == ADAPTIVE_PLAN_ROOT || is_codegen_wrapper(raw_name)
}

pub fn is_codegen_wrapper(raw_name: &str) -> bool {
    raw_name.contains(CODEGEN_WRAPPER)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub node_type: NodeType,
    pub display_name: String,
}

/// Maps a raw operator name to a semantic type and a human-friendly label.
pub trait NodeClassifier: Send + Sync + Debug {
    fn classify(&self, raw_name: &str) -> Classification;
}

/// Projects the raw metric payload of a node onto the metrics shown for its type.
pub trait NodeMetricCalculator: Send + Sync + Debug {
    fn project(&self, node_type: NodeType, raw: &[RawMetric]) -> Vec<NodeMetric>;
}

const EXACT_NAMES: &[(&str, NodeType, &str)] = &[
    ("LocalTableScan", NodeType::Input, "Read in-memory table"),
    ("InMemoryTableScan", NodeType::Input, "Read cache"),
    ("BatchScan", NodeType::Input, "Read"),
    ("Execute InsertIntoHadoopFsRelationCommand", NodeType::Output, "Write to HDFS"),
    ("Execute CreateDataSourceTableAsSelectCommand", NodeType::Output, "Create table"),
    ("Execute InsertIntoHiveTable", NodeType::Output, "Write to Hive"),
    ("AppendData", NodeType::Output, "Append data"),
    ("OverwriteByExpression", NodeType::Output, "Overwrite data"),
    ("CollectLimit", NodeType::Output, "Collect"),
    ("TakeOrderedAndProject", NodeType::Output, "Take ordered"),
    ("Filter", NodeType::Transformation, "Filter"),
    ("Project", NodeType::Transformation, "Select"),
    ("Expand", NodeType::Transformation, "Expand"),
    ("Generate", NodeType::Transformation, "Explode"),
    ("Window", NodeType::Transformation, "Window"),
    ("Union", NodeType::Transformation, "Union"),
    ("GlobalLimit", NodeType::Transformation, "Limit"),
    ("LocalLimit", NodeType::Transformation, "Limit"),
    ("HashAggregate", NodeType::Aggregate, "Aggregate"),
    ("SortAggregate", NodeType::Aggregate, "Aggregate"),
    ("ObjectHashAggregate", NodeType::Aggregate, "Aggregate"),
    ("BroadcastHashJoin", NodeType::Join, "Join (Broadcast Hash)"),
    ("SortMergeJoin", NodeType::Join, "Join (Sort Merge)"),
    ("ShuffledHashJoin", NodeType::Join, "Join (Shuffled Hash)"),
    ("BroadcastNestedLoopJoin", NodeType::Join, "Join (Broadcast Nested Loop)"),
    ("CartesianProduct", NodeType::Join, "Join (Cartesian)"),
    ("Exchange", NodeType::Shuffle, "Repartition"),
    ("BroadcastExchange", NodeType::Broadcast, "Broadcast"),
    ("Sort", NodeType::Sort, "Sort"),
];

/// Lookup-table classifier for the engine's physical operator names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableClassifier;

impl NodeClassifier for TableClassifier {
    fn classify(&self, raw_name: &str) -> Classification {
        let name = raw_name.trim();
        if let Some((_, node_type, display)) = EXACT_NAMES.iter().find(|(n, _, _)| *n == name) {
            return Classification {
                node_type: *node_type,
                display_name: (*display).to_string(),
            };
        }
        // "Scan parquet default.orders", "Scan csv", "Scan JDBCRelation(...)"
        if let Some(source) = name.strip_prefix("Scan ") {
            let format = source.split_whitespace().next().unwrap_or(source);
            return Classification {
                node_type: NodeType::Input,
                display_name: format!("Read {format}"),
            };
        }
        if name.starts_with("Execute ") && name.ends_with("Command") {
            return Classification {
                node_type: NodeType::Output,
                display_name: name.trim_start_matches("Execute ").to_string(),
            };
        }
        Classification {
            node_type: NodeType::Other,
            display_name: name.to_string(),
        }
    }
}

const METRIC_SELECTION: &[(NodeType, &str, &str)] = &[
    (NodeType::Input, "number of output rows", "Rows"),
    (NodeType::Input, "size of files read", "Bytes Read"),
    (NodeType::Input, "number of files read", "Files Read"),
    (NodeType::Output, "number of written files", "Files Written"),
    (NodeType::Output, "written output", "Bytes Written"),
    (NodeType::Output, "number of output rows", "Rows"),
    (NodeType::Transformation, "number of output rows", "Rows"),
    (NodeType::Aggregate, "number of output rows", "Rows"),
    (NodeType::Aggregate, "peak memory", "Peak Memory"),
    (NodeType::Aggregate, "spill size", "Spill Size"),
    (NodeType::Join, "number of output rows", "Rows"),
    (NodeType::Shuffle, "shuffle bytes written", "Shuffle Write"),
    (NodeType::Shuffle, "records read", "Records Read"),
    (NodeType::Shuffle, "data size", "Data Size"),
    (NodeType::Broadcast, "data size", "Broadcast Size"),
    (NodeType::Broadcast, "time to broadcast", "Broadcast Time"),
    (NodeType::Sort, "sort time", "Sort Time"),
    (NodeType::Sort, "peak memory", "Peak Memory"),
    (NodeType::Sort, "spill size", "Spill Size"),
];

/// Selects and relabels the metrics worth showing for each node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMetricCalculator;

impl NodeMetricCalculator for DefaultMetricCalculator {
    fn project(&self, node_type: NodeType, raw: &[RawMetric]) -> Vec<NodeMetric> {
        METRIC_SELECTION
            .iter()
            .filter(|(t, _, _)| *t == node_type)
            .filter_map(|(_, raw_name, label)| {
                raw.iter().find(|m| m.name == *raw_name).map(|m| NodeMetric {
                    name: (*label).to_string(),
                    value: metric_total(&m.value).to_string(),
                })
            })
            .collect()
    }
}

/// Total component of an aggregated metric value.
///
/// Task-level metrics arrive as `"total (min, med, max)\n3.2 s (1 ms, 5 ms, 10 ms)"`;
/// plain values pass through unchanged.
pub fn metric_total(value: &str) -> &str {
    let line = match value.split_once('\n') {
        Some((header, rest)) if header.starts_with("total") => rest,
        _ => value,
    };
    line.split(" (").next().unwrap_or(line).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, value: &str) -> RawMetric {
        RawMetric {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn classifies_known_operator_names() {
        let c = TableClassifier;
        assert_eq!(c.classify("Scan parquet default.orders").node_type, NodeType::Input);
        assert_eq!(c.classify("Scan parquet default.orders").display_name, "Read parquet");
        assert_eq!(c.classify("SortMergeJoin").node_type, NodeType::Join);
        assert_eq!(c.classify("Exchange").node_type, NodeType::Shuffle);
        assert_eq!(
            c.classify("Execute InsertIntoHadoopFsRelationCommand").node_type,
            NodeType::Output
        );
        assert_eq!(c.classify("WholeStageCodegen (2)").node_type, NodeType::Other);
        assert_eq!(c.classify("ColumnarToRow").node_type, NodeType::Other);
    }

    #[test]
    fn wrapper_names() {
        assert!(is_plan_wrapper("AdaptiveSparkPlan"));
        assert!(is_plan_wrapper("WholeStageCodegen (12)"));
        assert!(!is_plan_wrapper("Filter"));
    }

    #[test]
    fn projects_metrics_by_type_and_keeps_totals() {
        let raw = vec![
            metric("number of output rows", "1,024"),
            metric("peak memory", "total (min, med, max (stageId: taskId))\n64.0 MiB (1.0 MiB, 2.0 MiB, 8.0 MiB (stage 2.0: task 7))"),
            metric("time in aggregation build", "12 ms"),
        ];
        let projected = DefaultMetricCalculator.project(NodeType::Aggregate, &raw);
        assert_eq!(
            projected,
            vec![
                NodeMetric {
                    name: "Rows".to_string(),
                    value: "1,024".to_string()
                },
                NodeMetric {
                    name: "Peak Memory".to_string(),
                    value: "64.0 MiB".to_string()
                },
            ]
        );
        assert!(DefaultMetricCalculator.project(NodeType::Other, &raw).is_empty());
    }
}
