use planwatch_common::format::{human_bytes, humanize_duration};
use planwatch_core::{Activity, AppState};

/// Render one reconciled state as multiline text.
pub fn render_summary(state: &AppState) -> String {
    let mut s = String::new();
    if let Some(app) = &state.app {
        let name = app.app_name.as_deref().unwrap_or("-");
        s.push_str(&format!("app {} ({name}) engine={}\n", app.app_id, app.engine_version));
    }
    match &state.status {
        Some(status) => {
            let activity = match status.activity {
                Activity::Idle => "idle",
                Activity::Working => "working",
            };
            s.push_str(&format!(
                "status {activity} active_tasks={} pending_tasks={} input={} output={}\n",
                status.active_tasks,
                status.pending_tasks,
                human_bytes(status.input_bytes),
                human_bytes(status.output_bytes),
            ));
        }
        None => s.push_str("status unknown\n"),
    }
    if let Some(summary) = &state.executor_summary {
        s.push_str(&format!(
            "executors={} cores={} core_hours={:.3} uptime={}\n",
            summary.num_executors,
            summary.total_cores,
            summary.total_core_hours,
            humanize_duration(summary.duration_ms as f64, true),
        ));
    }
    let Some(store) = &state.store else {
        return s;
    };
    for q in &store.queries {
        let activity = q
            .resources
            .as_ref()
            .map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r.activity_rate));
        s.push_str(&format!(
            "  query {} {:?} rev={}/{} nodes={} activity={activity}\n",
            q.id,
            q.status,
            q.shape_revision,
            q.metric_revision,
            q.visible_nodes().count(),
        ));
        if let Some(reason) = &q.failure_reason {
            s.push_str(&format!("    failure: {reason}\n"));
        }
    }
    s
}
