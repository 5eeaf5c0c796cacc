use std::fs;
use std::sync::Arc;

use planwatch_client::{render_summary, DirectorySource, PollOutcome, Poller};
use planwatch_common::QueryId;
use planwatch_core::{QueryStatus, Reconciler};

fn write(dir: &std::path::Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write cycle");
}

const RUNNING: &str = r#"{
    "capturedAt": "2024-03-01T10:00:05.000GMT",
    "app": {"appId": "app-1", "engineVersion": "3.5.1",
            "sparkProperties": [["spark.app.name", "etl"]]},
    "stages": [{"stageId": 0, "status": "ACTIVE", "numTasks": 4, "numActiveTasks": 2,
                "executorRunTime": 500}],
    "executors": [{"id": "driver", "totalCores": 2, "addTime": "2024-03-01T10:00:00.000GMT"}],
    "jobs": [{"jobId": 0, "name": "save", "status": "RUNNING", "stageIds": [0]}],
    "queries": [{
        "id": "0", "status": "RUNNING", "description": "insert into t select * from s",
        "submissionTime": "2024-03-01T10:00:01.000GMT", "duration": 4000,
        "runningJobIds": [0],
        "nodes": [
            {"nodeId": 0, "nodeName": "Execute InsertIntoHadoopFsRelationCommand"},
            {"nodeId": 1, "nodeName": "WholeStageCodegen (1)", "wholeStageCodegenId": 1},
            {"nodeId": 2, "nodeName": "ColumnarToRow", "wholeStageCodegenId": 1},
            {"nodeId": 3, "nodeName": "Scan parquet s"}
        ],
        "edges": [{"fromId": 3, "toId": 2}, {"fromId": 2, "toId": 1}, {"fromId": 1, "toId": 0}]
    }]
}"#;

const COMPLETED: &str = r#"{
    "capturedAt": "2024-03-01T10:00:09.000GMT",
    "stages": [{"stageId": 0, "status": "COMPLETE", "numTasks": 4, "numCompleteTasks": 4,
                "executorRunTime": 900}],
    "jobs": [{"jobId": 0, "name": "save", "status": "SUCCEEDED", "stageIds": [0]}],
    "queries": [{
        "id": "0", "status": "COMPLETED", "description": "insert into t select * from s",
        "submissionTime": "2024-03-01T10:00:01.000GMT", "duration": 7000,
        "successJobIds": [0],
        "nodes": [
            {"nodeId": 0, "nodeName": "Execute InsertIntoHadoopFsRelationCommand"},
            {"nodeId": 1, "nodeName": "WholeStageCodegen (1)", "wholeStageCodegenId": 1},
            {"nodeId": 2, "nodeName": "ColumnarToRow", "wholeStageCodegenId": 1},
            {"nodeId": 3, "nodeName": "Scan parquet s"}
        ],
        "edges": [{"fromId": 3, "toId": 2}, {"fromId": 2, "toId": 1}, {"fromId": 1, "toId": 0}]
    }]
}"#;

#[test]
fn replays_directory_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "0002-completed.json", COMPLETED);
    write(dir.path(), "0001-running.json", RUNNING);
    write(dir.path(), "0003-truncated.json", "{\"queries\": [");

    let poller = Poller::new(Reconciler::default(), DirectorySource::new(dir.path()));
    let PollOutcome::Applied(states) = poller.poll_once() else {
        panic!("poll unexpectedly busy");
    };
    assert_eq!(states.len(), 2);

    let state = poller.state();
    assert!(Arc::ptr_eq(&state, &states[1]));
    let store = state.store.as_ref().expect("store");
    let query = store.get(QueryId(0)).expect("query 0");
    assert_eq!(query.status, QueryStatus::Completed);
    assert_eq!(query.shape_revision, 2);
    assert_eq!(query.visible_nodes().count(), 2);
    assert_eq!(query.total_executor_run_time_ms(), Some(900));
    assert_eq!(state.app.as_ref().expect("app").app_name.as_deref(), Some("etl"));

    let text = render_summary(&state);
    assert!(text.starts_with("app app-1 (etl) engine=3.5.1\nstatus idle"));
    assert!(text.contains("query 0 Completed rev=2/2 nodes=2"));
}

#[test]
fn later_files_are_picked_up_on_next_poll() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "0001.json", RUNNING);
    let poller = Poller::new(Reconciler::default(), DirectorySource::new(dir.path()));
    poller.poll_once();
    let first = poller.state();

    write(dir.path(), "0002.json", COMPLETED);
    poller.poll_once();
    assert!(!Arc::ptr_eq(&first, &poller.state()));

    assert!(matches!(poller.poll_once(), PollOutcome::Applied(v) if v.is_empty()));
}
