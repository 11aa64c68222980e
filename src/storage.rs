//! Benchmark run persistence.
//!
//! Normalized runs are written as pretty JSON, one file per run, under the platform
//! data directory. Nothing here is needed for the orchestrator to work.

use crate::metrics::BenchmarkMetrics;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A benchmark result as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRun {
    pub timestamp_utc: String,
    pub base_url: String,
    #[serde(default)]
    pub llm_name: Option<String>,
    pub metrics: BenchmarkMetrics,
}

impl SavedRun {
    pub fn new(base_url: &str, llm_name: Option<&str>, metrics: BenchmarkMetrics) -> Self {
        Self {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            base_url: base_url.to_string(),
            llm_name: llm_name.map(str::to_string),
            metrics,
        }
    }
}

/// Default directory for auto-saved runs.
pub fn runs_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("no local data directory on this platform")?;
    Ok(base.join("rag-bench-cli").join("runs"))
}

fn file_name(run: &SavedRun) -> String {
    let stamp = run.timestamp_utc.replace(':', "-").replace('T', "_");
    format!("rag-bench-{stamp}.json")
}

pub fn save_run(run: &SavedRun) -> Result<PathBuf> {
    save_run_in(&runs_dir()?, run)
}

pub fn save_run_in(dir: &Path, run: &SavedRun) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(file_name(run));
    export_json(&path, run)?;
    Ok(path)
}

pub fn export_json(path: &Path, run: &SavedRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("serialize benchmark run")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_recent(limit: usize) -> Result<Vec<SavedRun>> {
    load_recent_in(&runs_dir()?, limit)
}

/// Load up to `limit` runs, newest first. Unreadable files are skipped.
pub fn load_recent_in(dir: &Path, limit: usize) -> Result<Vec<SavedRun>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    // File names carry the timestamp, so name order is time order.
    paths.sort();
    paths.reverse();

    let mut runs = Vec::new();
    for path in paths {
        if runs.len() >= limit {
            break;
        }
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<SavedRun>(&text) {
            Ok(run) => runs.push(run),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable run"),
        }
    }
    Ok(runs)
}
