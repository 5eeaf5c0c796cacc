//! Reconciliation of polled query-plan snapshots into a shared, versioned state tree.
//!
//! Architecture role:
//! - decodes poll-cycle payloads ([`snapshot`])
//! - compiles raw plans into simplified DAGs with derived metrics ([`compile`], [`dag`])
//! - merges each cycle into the previous [`Store`], reusing every unchanged `Arc`
//! - folds whole cycles into [`AppState`] through [`Reconciler`]
//!
//! Key modules:
//! - [`aggregate`]
//! - [`app`]
//! - [`classify`]
//! - [`compile`]
//! - [`dag`]
//! - [`enrich`]
//! - [`merge`]
//! - [`model`]
//! - [`resources`]
//! - [`reuse`]
//! - [`snapshot`]
//! - [`status`]

pub mod aggregate;
pub mod app;
pub mod classify;
pub mod compile;
pub mod dag;
pub mod enrich;
pub mod merge;
pub mod model;
pub mod resources;
pub mod reuse;
pub mod snapshot;
pub mod status;

pub use aggregate::{JobRecord, StageMetric, StageRecord};
pub use app::{AppDetails, AppState, Reconciler};
pub use classify::{
    Classification, DefaultMetricCalculator, NodeClassifier, NodeMetricCalculator, TableClassifier,
};
pub use compile::{compile_query, CompileContext};
pub use dag::simplify;
pub use merge::{merge, update_node_metrics, MergeDecision};
pub use model::{CodegenEntry, Edge, Node, NodeMetric, NodeType, Query, ResourceUsage, Store};
pub use resources::{ExecutorRecord, ExecutorSummary, GlobalTotals};
pub use snapshot::{PollCycle, QueryStatus};
pub use status::{Activity, Status};
