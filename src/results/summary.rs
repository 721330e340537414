//! Run summary file
//!
//! Persists the outcome of a run as JSON for tooling downstream of the exit
//! code.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::models::{MergeCollision, Outcome, ScenarioId};
use crate::orchestrator::RunReport;

/// Stored summary of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the run finished
    pub finished_at: DateTime<Utc>,

    /// Number of discovered scenarios
    pub discovered: usize,

    /// Workers started
    pub workers: usize,

    /// Batch size handed to workers
    pub batch_size: usize,

    /// Scenarios per outcome
    pub outcomes: BTreeMap<Outcome, Vec<ScenarioId>>,

    /// Discovered but never reported
    pub not_run: Vec<ScenarioId>,

    /// Scenarios reported by more than one worker
    pub collisions: Vec<MergeCollision>,

    /// Whether the queue was empty after the run
    pub queue_drained: bool,

    /// Process exit code
    pub exit_code: i32,
}

impl StoredRun {
    pub fn from_report(report: &RunReport) -> Self {
        let outcomes = report
            .summary
            .groups
            .iter()
            .filter(|(_, scenarios)| !scenarios.is_empty())
            .map(|(outcome, scenarios)| (*outcome, scenarios.clone()))
            .collect();

        Self {
            id: generate_run_id(&report.started_at),
            started_at: report.started_at,
            finished_at: report.finished_at,
            discovered: report.discovered,
            workers: report.plan.map(|p| p.workers).unwrap_or(0),
            batch_size: report.plan.map(|p| p.batch_size).unwrap_or(0),
            outcomes,
            not_run: report.summary.not_run.clone(),
            collisions: report.summary.collisions.clone(),
            queue_drained: report.queue_drained,
            exit_code: report.exit_code(),
        }
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(path).context("Failed to create summary file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Failed to write summary")?;

        info!("Saved run summary to {}", path.display());
        Ok(())
    }
}

/// Generate unique run ID
fn generate_run_id(started_at: &DateTime<Utc>) -> String {
    let timestamp = started_at.format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
