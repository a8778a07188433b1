use crate::core::models::ScanReport;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Reports for one batch, keyed by the target string as supplied.
pub type BatchReport = BTreeMap<String, ScanReport>;

pub fn write_json(reports: &BatchReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(reports).context("Failed to serialize scan report")?;
    atomic_write(path, json.as_bytes())
        .with_context(|| format!("Failed to write report to {:?}", path))?;
    tracing::info!("Wrote {} target report(s) to {:?}", reports.len(), path);
    Ok(())
}
