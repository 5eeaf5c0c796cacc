//! `GET /metrics` endpoint serving the planwatch registry in Prometheus text format.
//!
//! Exposes reconcile decision counts, DAG simplification sizes, phase timings,
//! poll-cycle outcomes and the store/task gauges recorded through
//! [`global_metrics`]. Only built with the `profiling` feature.

use std::io;
use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use crate::metrics::global_metrics;

/// Bind `addr` and serve until the listener fails.
pub async fn run_metrics_exporter(addr: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_metrics_listener(listener).await
}

pub async fn serve_metrics_listener(listener: TcpListener) -> io::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    axum::serve(listener, app).await.map_err(io::Error::other)
}

async fn metrics_handler() -> String {
    global_metrics().render_prometheus()
}
