//! Per-run outcome summary, logged at the end of a run and optionally
//! persisted as JSON.

use std::path::Path;

use activity_types::ActivitySource;
use anyhow::{Context, Result};
use serde::Serialize;

use crate::collection_window::CollectionWindow;

/// Counts for one collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: ActivitySource,
    pub collected: usize,
    pub resolved: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub window: CollectionWindow,
    pub sources: Vec<SourceReport>,
    pub batch_size: usize,
    pub written: usize,
    pub failed_ids: Vec<String>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }

    pub fn log_summary(&self) {
        for source in &self.sources {
            tracing::info!(
                source = %source.source,
                collected = source.collected,
                resolved = source.resolved,
                dropped = source.dropped,
                "source summary"
            );
        }
        tracing::info!(
            window_start = %self.window.start,
            window_end = %self.window.end,
            batch_size = self.batch_size,
            written = self.written,
            failed = self.failed(),
            dry_run = self.dry_run,
            "ingestion run finished"
        );
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize run report")
    }
}

/// Replaces `path` through a sibling temp file and a rename.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("'{}' has no file name", path.display()))?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let temp_path = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| format!("failed to replace {}", path.display()));
    }
    Ok(())
}

pub fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    let mut payload = report.to_json_pretty()?;
    payload.push('\n');
    write_text_atomic(path, &payload)
}
