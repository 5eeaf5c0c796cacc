//! Shared configuration, error types, IDs, format helpers and observability
//! primitives for planwatch crates.
//!
//! Architecture role:
//! - defines the watcher configuration passed from the binary into the reconciler
//! - provides common [`PlanwatchError`] / [`Result`] contracts
//! - hosts the prometheus metrics registry and optional exporter utilities
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`format`]
//! - [`ids`]
//! - [`metrics`]
//! - `metrics_exporter` (feature-gated)
//!
//! Feature flags:
//! - `profiling`: enables the metrics HTTP exporter helpers.

pub mod config;
pub mod error;
pub mod format;
pub mod ids;
pub mod metrics;
#[cfg(feature = "profiling")]
pub mod metrics_exporter;

pub use config::WatchConfig;
pub use error::{PlanwatchError, Result};
pub use ids::*;
pub use metrics::MetricsRegistry;
#[cfg(feature = "profiling")]
pub use metrics_exporter::run_metrics_exporter;
