//! JSON output of the run report.
//!
//! The report is always logged as a single JSON line at the end of a run.
//! With `--report-json <path>` it is also written to disk so a scheduler or
//! alerting hook can pick it up without parsing logs.

use crate::pipeline::RunReport;
use crate::utils::ensure_parent_dir;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize a [`RunReport`] to a compact JSON line.
pub fn report_json_line(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Write a [`RunReport`] as pretty JSON to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if serialization, directory creation or the write fails.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &RunReport, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Err(e) = ensure_parent_dir(path).await {
        error!(error = %e, "Failed to create report directory");
        return Err(e);
    }

    fs::write(path, json).await?;
    info!("Wrote run report");
    Ok(())
}
