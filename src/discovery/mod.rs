//! Scenario discovery
//!
//! Enumerates every runnable scenario without executing any of them.

mod cucumber;

pub use cucumber::CucumberDiscovery;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::ScenarioId;

/// Discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dry run exited with {status}: {stderr}")]
    DryRunFailed { status: String, stderr: String },

    #[error("Failed to parse dry run report: {0}")]
    InvalidReport(#[from] serde_json::Error),
}

/// A discovery engine able to perform a dry run
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Run the engine once and return its raw report
    async fn dry_run_report(&self, args: &[String]) -> Result<String, DiscoveryError>;

    /// Extract scenario identifiers from a report
    fn parse_report(&self, report: &str) -> Result<BTreeSet<ScenarioId>, DiscoveryError>;

    /// Dry run followed by parsing; duplicates collapse into one identifier
    async fn discover(&self, args: &[String]) -> Result<BTreeSet<ScenarioId>, DiscoveryError> {
        let report = self.dry_run_report(args).await?;
        self.parse_report(&report)
    }
}
