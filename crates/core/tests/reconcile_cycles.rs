use std::sync::Arc;

use planwatch_common::{PlanwatchError, QueryId};
use planwatch_core::resources::{resource_usage, ExecutorRecord, GlobalTotals};
use planwatch_core::{AppState, PollCycle, Reconciler};
use proptest::prelude::*;
use serde_json::{json, Value};

const PLAN_5: &[&str] = &["Scan parquet sales", "Filter", "Project", "Exchange", "HashAggregate"];
const PLAN_6: &[&str] = &[
    "Scan parquet sales",
    "Filter",
    "Project",
    "Exchange",
    "HashAggregate",
    "Sort",
];

fn query(id: u64, status: &str, names: &[&str], duration: u64) -> Value {
    let nodes = names
        .iter()
        .enumerate()
        .map(|(i, name)| json!({"nodeId": i, "nodeName": name, "metrics": []}))
        .collect::<Vec<_>>();
    let edges = (1..names.len())
        .map(|i| json!({"fromId": i - 1, "toId": i}))
        .collect::<Vec<_>>();
    json!({
        "id": id.to_string(),
        "status": status,
        "description": "select region, sum(amount) from sales group by region",
        "submissionTime": "2024-03-01T10:00:00.000GMT",
        "duration": duration,
        "successJobIds": [],
        "failedJobIds": [],
        "runningJobIds": [0],
        "nodes": nodes,
        "edges": edges,
    })
}

fn cycle(queries: Vec<Value>) -> PollCycle {
    let raw = json!({
        "capturedAt": "2024-03-01T10:00:10.000GMT",
        "stages": [{
            "stageId": 0,
            "status": "ACTIVE",
            "numTasks": 8,
            "numActiveTasks": 2,
            "numCompleteTasks": 4,
            "executorRunTime": 3000,
            "inputBytes": 1024,
        }],
        "stageOperators": {"0": {"3": "WholeStageCodegen (1)"}},
        "executors": [
            {"id": "driver", "totalCores": 1, "addTime": "2024-03-01T09:59:00.000GMT"},
            {"id": "1", "totalCores": 4, "addTime": "2024-03-01T09:59:30.000GMT"},
        ],
        "jobs": [{"jobId": 0, "name": "collect", "status": "RUNNING", "stageIds": [0]}],
        "queries": queries,
    });
    serde_json::from_value(raw).expect("decode cycle")
}

fn apply(reconciler: &Reconciler, state: &Arc<AppState>, cycle: &PollCycle) -> Arc<AppState> {
    reconciler.apply(state, cycle).expect("apply cycle")
}

fn only_query(state: &AppState) -> Arc<planwatch_core::Query> {
    let store = state.store.as_ref().expect("store");
    Arc::clone(store.get(QueryId(0)).expect("query 0"))
}

#[test]
fn same_node_count_is_shallow_and_new_count_recompiles() {
    let reconciler = Reconciler::default();
    let empty = Arc::new(AppState::default());
    let first = apply(&reconciler, &empty, &cycle(vec![query(0, "RUNNING", PLAN_5, 1_000)]));
    let compiled = only_query(&first);
    assert_eq!(compiled.shape_revision, 1);
    assert_eq!(compiled.nodes.len(), 5);

    let second = apply(&reconciler, &first, &cycle(vec![query(0, "RUNNING", PLAN_5, 2_000)]));
    let shallow = only_query(&second);
    assert_eq!(shallow.duration_ms, 2_000);
    assert_eq!(shallow.shape_revision, compiled.shape_revision);
    assert!(Arc::ptr_eq(&shallow.edges, &compiled.edges));

    let third = apply(&reconciler, &second, &cycle(vec![query(0, "RUNNING", PLAN_6, 3_000)]));
    let recompiled = only_query(&third);
    assert_eq!(recompiled.shape_revision, shallow.shape_revision + 1);
    assert!(recompiled.metric_revision > shallow.metric_revision);
    assert_eq!(recompiled.original_num_of_nodes, 6);
}

#[test]
fn unchanged_cycle_returns_the_same_state() {
    let reconciler = Reconciler::default();
    let polled = cycle(vec![query(0, "RUNNING", PLAN_5, 1_000)]);
    let first = apply(&reconciler, &Arc::new(AppState::default()), &polled);
    let second = apply(&reconciler, &first, &polled);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn live_counters_reach_query_metrics_and_resources() {
    let reconciler = Reconciler::default();
    let state = apply(
        &reconciler,
        &Arc::new(AppState::default()),
        &cycle(vec![query(0, "RUNNING", PLAN_5, 10_000)]),
    );
    let q = only_query(&state);
    assert_eq!(q.total_executor_run_time_ms(), Some(3_000));
    let resources = q.resources.as_deref().expect("resources");
    assert!(resources.activity_rate > 0.0 && resources.activity_rate <= 100.0);

    let status = state.status.as_deref().expect("status");
    assert_eq!(status.active_tasks, 2);
    assert_eq!(status.pending_tasks, 2);
    let summary = state.executor_summary.as_deref().expect("summary");
    assert_eq!(summary.num_executors, 1);
    assert_eq!(summary.total_cores, 5);
}

#[test]
fn finished_query_is_recompiled_once() {
    let reconciler = Reconciler::default();
    let running = apply(
        &reconciler,
        &Arc::new(AppState::default()),
        &cycle(vec![query(0, "RUNNING", PLAN_5, 1_000)]),
    );
    let done = cycle(vec![query(0, "COMPLETED", PLAN_5, 4_000)]);
    let completed = apply(&reconciler, &running, &done);
    assert_eq!(only_query(&completed).shape_revision, 2);

    let reported_again = apply(&reconciler, &completed, &done);
    assert!(Arc::ptr_eq(
        completed.store.as_ref().expect("store"),
        reported_again.store.as_ref().expect("store")
    ));
}

#[test]
fn node_metrics_update_bumps_metric_revision_only() {
    let reconciler = Reconciler::default();
    let state = apply(
        &reconciler,
        &Arc::new(AppState::default()),
        &cycle(vec![query(0, "RUNNING", PLAN_5, 1_000)]),
    );
    let before = only_query(&state);

    let mut update = cycle(vec![]);
    update.node_metrics = serde_json::from_value(json!({
        "queryId": "0",
        "nodes": [{"id": 1, "metrics": [{"name": "number of output rows", "value": "1,000"}]}],
    }))
    .expect("decode update");
    let next = apply(&reconciler, &state, &update);
    let after = only_query(&next);
    assert_eq!(after.shape_revision, before.shape_revision);
    assert_eq!(after.metric_revision, before.metric_revision + 1);
}

#[test]
fn unknown_duration_unit_fails_the_cycle() {
    let reconciler = Reconciler::default();
    let mut raw = query(0, "RUNNING", &["WholeStageCodegen (1)", "Filter"], 1_000);
    raw["nodes"][0]["wholeStageCodegenId"] = json!(1);
    raw["nodes"][0]["metrics"] = json!([{"name": "duration", "value": "4 weeks"}]);
    let err = reconciler
        .apply(&Arc::new(AppState::default()), &cycle(vec![raw]))
        .expect_err("unknown unit");
    assert!(matches!(err, PlanwatchError::UnsupportedUnit(_)));
}

proptest! {
    #[test]
    fn activity_rate_stays_within_bounds(
        run_time in 0u64..10_000_000,
        duration in 0u64..1_000_000,
        executors in prop::collection::vec((1u64..64, 0u64..500_000, prop::option::of(0u64..2_000_000)), 0..6),
    ) {
        let records = executors
            .iter()
            .enumerate()
            .map(|(i, (cores, add, end))| ExecutorRecord {
                id: if i == 0 { "driver".to_string() } else { i.to_string() },
                cores: *cores,
                add_time_ms: *add,
                end_time_ms: end.map(|e| e.max(*add)),
                is_driver: i == 0,
            })
            .collect::<Vec<_>>();
        let usage = resource_usage(1_000, duration, run_time, &records, GlobalTotals::default());
        prop_assert!((0.0..=100.0).contains(&usage.activity_rate));
        prop_assert!(!usage.core_hour_percentage.is_nan());
    }
}
