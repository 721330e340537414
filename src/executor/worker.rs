//! Worker execution unit
//!
//! A worker drains scenarios from the shared queue in its own process and
//! reports an outcome per scenario it ran.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::models::{Outcome, OutcomeMap};

/// Worker errors
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to start worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {index} exited with {status}")]
    Exited { index: usize, status: String },

    #[error("Failed to remove stale results of worker {index} at {path}: {source}")]
    StaleResults {
        index: usize,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read results of worker {index} from {path}: {source}")]
    ResultsMissing {
        index: usize,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed results of worker {index}: {source}")]
    ResultsMalformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Worker {index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

/// Everything one worker needs to start
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerTask {
    pub index: usize,
    pub batch_size: usize,
    pub env: Environment,
}

/// Runs one worker to completion
#[async_trait]
pub trait WorkerRunner: Send + Sync {
    async fn run(&self, task: WorkerTask) -> Result<OutcomeMap, WorkerError>;
}

/// Queue location handed to worker processes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueParams {
    pub url: String,
    pub name: String,
}

/// Worker running as a child process.
///
/// The child is invoked as
/// `<command> <args...> --queue-url URL --queue-name NAME --batch-size B
/// --worker-index I --results FILE` with the derived environment added to
/// ours. It must write `{"<scenario>": "<outcome>"}` JSON to FILE.
#[derive(Clone, Debug)]
pub struct ProcessWorker {
    command: String,
    args: Vec<String>,
    queue: QueueParams,
    results_dir: PathBuf,
}

impl ProcessWorker {
    pub fn new(command: impl Into<String>, queue: QueueParams, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            queue,
            results_dir: results_dir.into(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Results file of one worker
    pub fn results_path(&self, index: usize) -> PathBuf {
        self.results_dir.join(format!("worker-{index}.json"))
    }

    fn command_args(&self, task: &WorkerTask, results: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--queue-url".to_string(),
            self.queue.url.clone(),
            "--queue-name".to_string(),
            self.queue.name.clone(),
            "--batch-size".to_string(),
            task.batch_size.to_string(),
            "--worker-index".to_string(),
            task.index.to_string(),
            "--results".to_string(),
            results.display().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl WorkerRunner for ProcessWorker {
    async fn run(&self, task: WorkerTask) -> Result<OutcomeMap, WorkerError> {
        let index = task.index;
        let results = self.results_path(index);
        let args = self.command_args(&task, &results);

        // A stale file from an earlier run must not pass for this run's results
        match tokio::fs::remove_file(&results).await {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                return Err(WorkerError::StaleResults {
                    index,
                    path: results.display().to_string(),
                    source: e,
                });
            }
            _ => {}
        }

        debug!("Starting worker: {} {:?}", self.command, args);
        let start = Instant::now();

        let status = Command::new(&self.command)
            .args(&args)
            .envs(&task.env)
            .status()
            .await
            .map_err(|source| WorkerError::Spawn { index, source })?;

        info!(
            "Worker finished in {}s with {}",
            start.elapsed().as_secs(),
            status
        );

        let outcomes = match tokio::fs::read_to_string(&results).await {
            Ok(content) => parse_results(index, &content),
            Err(source) => Err(WorkerError::ResultsMissing {
                index,
                path: results.display().to_string(),
                source,
            }),
        };

        match outcomes {
            Ok(outcomes) => {
                // Cucumber exits non-zero when a scenario fails
                if !status.success() {
                    warn!("Worker {} exited with {}, keeping its results", index, status);
                }
                Ok(outcomes)
            }
            Err(e) if status.success() => Err(e),
            Err(e) => {
                debug!("No usable results from worker {}: {}", index, e);
                Err(WorkerError::Exited {
                    index,
                    status: status.to_string(),
                })
            }
        }
    }
}

/// Parse a worker's results file
pub fn parse_results(index: usize, content: &str) -> Result<OutcomeMap, WorkerError> {
    serde_json::from_str::<OutcomeMap>(content)
        .map_err(|source| WorkerError::ResultsMalformed { index, source })
}

/// Fold a worker's outcomes into a short description, for logs
pub fn describe(outcomes: &OutcomeMap) -> String {
    Outcome::ALL
        .iter()
        .filter_map(|o| {
            let n = outcomes.values().filter(|v| *v == o).count();
            (n > 0).then(|| format!("{} {}", n, o.name()))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
