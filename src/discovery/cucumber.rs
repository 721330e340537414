//! Cucumber dry-run discovery
//!
//! Runs `cucumber --dry-run --format json` and reads scenario locations from
//! the JSON report.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use tokio::process::Command;
use tracing::debug;

use super::{Discovery, DiscoveryError};
use crate::models::ScenarioId;

/// Feature entry of a cucumber JSON report
#[derive(Debug, Deserialize)]
struct Feature {
    uri: String,
    #[serde(default)]
    elements: Vec<Element>,
}

/// Scenario or background entry of a feature
#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type", default)]
    kind: String,
    line: u32,
}

/// Discovery through the cucumber executable
#[derive(Clone, Debug)]
pub struct CucumberDiscovery {
    command: String,
    options: Vec<String>,
}

impl CucumberDiscovery {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: Vec::new(),
        }
    }

    /// Extra options placed before the selection arguments
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    fn dry_run_args(&self, args: &[String]) -> Vec<String> {
        let mut all = self.options.clone();
        all.extend(args.iter().cloned());
        all.extend(["--dry-run", "--format", "json"].map(String::from));
        all
    }
}

impl Default for CucumberDiscovery {
    fn default() -> Self {
        Self::new("cucumber")
    }
}

#[async_trait]
impl Discovery for CucumberDiscovery {
    async fn dry_run_report(&self, args: &[String]) -> Result<String, DiscoveryError> {
        let args = self.dry_run_args(args);
        debug!("Executing dry run: {} {:?}", self.command, args);

        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .await
            .map_err(|source| DiscoveryError::Launch {
                command: self.command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(DiscoveryError::DryRunFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn parse_report(&self, report: &str) -> Result<BTreeSet<ScenarioId>, DiscoveryError> {
        let features: Vec<Feature> = serde_json::from_str(report)?;

        Ok(features
            .iter()
            .flat_map(|feature| {
                feature
                    .elements
                    .iter()
                    .filter(|e| e.kind == "scenario")
                    .map(move |e| format!("{}:{}", feature.uri, e.line))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"[
      {
        "uri": "features/login.feature",
        "elements": [
          {"type": "background", "line": 3},
          {"type": "scenario", "line": 7},
          {"type": "scenario", "line": 12}
        ]
      },
      {
        "uri": "features/search.feature",
        "elements": [
          {"type": "scenario", "line": 4},
          {"type": "scenario", "line": 4}
        ]
      },
      {"uri": "features/empty.feature"}
    ]"#;

    #[test]
    fn test_parse_report() {
        let ids = CucumberDiscovery::default().parse_report(REPORT).unwrap();
        let expected: BTreeSet<ScenarioId> = [
            "features/login.feature:7",
            "features/login.feature:12",
            "features/search.feature:4",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(ids, expected);
    }

    #[test]
    fn test_parse_invalid_report() {
        let result = CucumberDiscovery::default().parse_report("Using the default profile...");
        assert!(matches!(result, Err(DiscoveryError::InvalidReport(_))));
    }

    #[test]
    fn test_dry_run_args() {
        let discovery = CucumberDiscovery::new("bundle")
            .with_options(vec!["exec".to_string(), "cucumber".to_string()]);
        let args = discovery.dry_run_args(&["--tags".to_string(), "@smoke".to_string()]);

        assert_eq!(
            args,
            vec!["exec", "cucumber", "--tags", "@smoke", "--dry-run", "--format", "json"]
        );
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let discovery = CucumberDiscovery::new("definitely-not-a-cucumber-binary");
        let result = discovery.discover(&[]).await;
        assert!(matches!(result, Err(DiscoveryError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_discover_from_command_output() {
        // `sh -c` ignores the trailing dry-run flags
        let discovery = CucumberDiscovery::new("sh").with_options(vec![
            "-c".to_string(),
            r#"echo '[{"uri": "a.feature", "elements": [{"type": "scenario", "line": 2}]}]'"#
                .to_string(),
        ]);
        let ids = discovery.discover(&[]).await.unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["a.feature:2"]);
    }
}
