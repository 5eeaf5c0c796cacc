use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanwatchError, Result};

/// Watcher configuration shared by the client binary and the poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Delay between poll cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Directory holding recorded poll-cycle JSON files.
    pub snapshot_dir: String,
    /// Optional bind address for the prometheus exporter (`profiling` feature).
    pub metrics_bind: Option<String>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            snapshot_dir: "./snapshots".to_string(),
            metrics_bind: None,
            log_filter: "info".to_string(),
        }
    }
}

impl WatchConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        serde_json::from_str(&s).map_err(|e| PlanwatchError::InvalidConfig(e.to_string()))
    }

    /// Apply `PLANWATCH_*` environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("PLANWATCH_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v.parse::<u64>().map_err(|e| {
                PlanwatchError::InvalidConfig(format!("PLANWATCH_POLL_INTERVAL_MS={v}: {e}"))
            })?;
        }
        if let Some(v) = lookup("PLANWATCH_SNAPSHOT_DIR") {
            self.snapshot_dir = v;
        }
        if let Some(v) = lookup("PLANWATCH_METRICS_BIND") {
            self.metrics_bind = Some(v);
        }
        if let Some(v) = lookup("PLANWATCH_LOG") {
            self.log_filter = v;
        }
        if self.poll_interval_ms == 0 {
            return Err(PlanwatchError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::WatchConfig;
    use crate::PlanwatchError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let cfg = WatchConfig::default()
            .with_overrides(lookup(&[
                ("PLANWATCH_POLL_INTERVAL_MS", "250"),
                ("PLANWATCH_SNAPSHOT_DIR", "/tmp/cycles"),
            ]))
            .expect("config");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.snapshot_dir, "/tmp/cycles");
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn rejects_bad_interval() {
        let err = WatchConfig::default()
            .with_overrides(lookup(&[("PLANWATCH_POLL_INTERVAL_MS", "soon")]))
            .expect_err("must fail");
        assert!(matches!(err, PlanwatchError::InvalidConfig(_)));

        let err = WatchConfig::default()
            .with_overrides(lookup(&[("PLANWATCH_POLL_INTERVAL_MS", "0")]))
            .expect_err("must fail");
        assert!(matches!(err, PlanwatchError::InvalidConfig(_)));
    }

    #[test]
    fn json_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("planwatch.json");
        std::fs::write(&path, r#"{"poll_interval_ms": 500}"#).expect("write");
        let cfg = WatchConfig::load_from_json(&path).expect("load");
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.snapshot_dir, WatchConfig::default().snapshot_dir);
    }
}
