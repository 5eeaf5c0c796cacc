//! Recorded poll cycles on disk, one JSON document per cycle.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use planwatch_common::{PlanwatchError, Result};
use planwatch_core::PollCycle;

/// Hands out `*.json` files of a directory in name order, each file once.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    seen: BTreeSet<PathBuf>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seen: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cycle files that appeared since the previous call, sorted by file name.
    pub fn next_batch(&mut self) -> Result<Vec<PathBuf>> {
        let mut fresh = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if !self.seen.contains(&path) {
                fresh.push(path);
            }
        }
        fresh.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        self.seen.extend(fresh.iter().cloned());
        Ok(fresh)
    }
}

pub fn read_cycle(path: &Path) -> Result<PollCycle> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| PlanwatchError::Snapshot(format!("{}: {e}", path.display())))
}
