use std::path::PathBuf;

use anyhow::{Context, Result};
use promptcraft_store::ReportStore;
use serde::Serialize;

/// Save an evaluation or comparison as a JSON report.
///
/// Without a filename the report gets a timestamped `eval_report_*.json` name.
pub fn generate_report<T: Serialize>(report: &T, store: &ReportStore, filename: Option<&str>) -> Result<PathBuf> {
    store
        .save(report, filename)
        .with_context(|| format!("Failed to write report to {}", store.dir().display()))
}
