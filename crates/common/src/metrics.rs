use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    reconcile_decisions: CounterVec,
    dag_nodes: CounterVec,
    phase_seconds: HistogramVec,
    poll_cycles: CounterVec,
    store_queries: Gauge,
    active_tasks: Gauge,
    pending_tasks: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Count one merge decision (`new`, `terminal`, `restructured`, `shallow`, `retained`).
    pub fn record_reconcile_decision(&self, decision: &str) {
        self.inner
            .reconcile_decisions
            .with_label_values(&[decision])
            .inc();
    }

    /// Record node counts before and after DAG simplification.
    pub fn record_dag_simplified(&self, raw_nodes: u64, visible_nodes: u64) {
        self.inner
            .dag_nodes
            .with_label_values(&["raw"])
            .inc_by(raw_nodes as f64);
        self.inner
            .dag_nodes
            .with_label_values(&["visible"])
            .inc_by(visible_nodes as f64);
    }

    pub fn observe_phase(&self, phase: &str, secs: f64) {
        self.inner
            .phase_seconds
            .with_label_values(&[phase])
            .observe(secs.max(0.0));
    }

    /// Count one poll cycle by outcome (`applied`, `failed`, `busy`).
    pub fn record_poll_cycle(&self, outcome: &str) {
        self.inner.poll_cycles.with_label_values(&[outcome]).inc();
    }

    pub fn set_store_queries(&self, queries: u64) {
        self.inner.store_queries.set(queries as f64);
    }

    pub fn set_task_status(&self, active: u64, pending: i64) {
        self.inner.active_tasks.set(active as f64);
        self.inner.pending_tasks.set(pending as f64);
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let reconcile_decisions = counter_vec(
            &registry,
            "planwatch_reconcile_decisions_total",
            "Per-query merge decisions taken by the snapshot merger",
            &["decision"],
        );
        let dag_nodes = counter_vec(
            &registry,
            "planwatch_dag_nodes_total",
            "Plan nodes seen before (raw) and after (visible) simplification",
            &["kind"],
        );
        let phase_seconds = histogram_vec(
            &registry,
            "planwatch_phase_seconds",
            "Time spent in reconciliation phases",
            &["phase"],
        );
        let poll_cycles = counter_vec(
            &registry,
            "planwatch_poll_cycles_total",
            "Poll cycles by outcome",
            &["outcome"],
        );
        let store_queries = gauge(
            &registry,
            "planwatch_store_queries",
            "Queries currently held in the store",
        );
        let active_tasks = gauge(
            &registry,
            "planwatch_active_tasks",
            "Active tasks across non-skipped stages",
        );
        let pending_tasks = gauge(
            &registry,
            "planwatch_pending_tasks",
            "Pending tasks across non-skipped stages",
        );

        Self {
            registry,
            reconcile_decisions,
            dag_nodes,
            phase_seconds,
            poll_cycles,
            store_queries,
            active_tasks,
            pending_tasks,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Gauge {
    let g = Gauge::with_opts(Opts::new(name, help)).expect("gauge");
    registry
        .register(Box::new(g.clone()))
        .expect("register gauge");
    g
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn renders_prometheus_text() {
        let m = MetricsRegistry::new();
        m.record_reconcile_decision("shallow");
        let text = m.render_prometheus();
        assert!(text.contains("planwatch_reconcile_decisions_total"));
        assert!(text.contains("shallow"));
    }

    #[test]
    fn renders_all_metric_families() {
        let m = MetricsRegistry::new();
        m.record_reconcile_decision("new");
        m.record_dag_simplified(12, 5);
        m.observe_phase("compile", 0.002);
        m.record_poll_cycle("applied");
        m.set_store_queries(3);
        m.set_task_status(4, -2);
        let text = m.render_prometheus();

        assert!(text.contains("planwatch_reconcile_decisions_total"));
        assert!(text.contains("planwatch_dag_nodes_total"));
        assert!(text.contains("planwatch_phase_seconds"));
        assert!(text.contains("planwatch_poll_cycles_total"));
        assert!(text.contains("planwatch_store_queries 3"));
        assert!(text.contains("planwatch_active_tasks 4"));
        assert!(text.contains("planwatch_pending_tasks -2"));
    }
}
