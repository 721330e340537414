//! Run orchestration
//!
//! Discovers scenarios, fills the shared queue, fans out to the worker pool
//! and folds every worker's outcomes into one report and exit code.

mod plan;

pub use plan::{clamp_workers, normalize_batch_size, RunPlan};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::discovery::{Discovery, DiscoveryError};
use crate::environment::{self, EnvError, EnvSpec};
use crate::executor::{WorkerPool, WorkerTask};
use crate::models::{ResultSet, RunSummary, ScenarioId};
use crate::queue::{QueueError, WorkQueue};
use crate::utils::timer::{minutes_seconds, Timer};

/// Errors that abort a run before any worker starts
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Queue '{0}' is not empty")]
    QueueNotEmpty(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Environment(#[from] EnvError),
}

impl OrchestratorError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Tunables of one run
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Arguments selecting the scenarios to discover
    pub selection_args: Vec<String>,
    /// Requested worker count; 0 infers it from the environment spec
    pub workers: usize,
    /// Target number of scenarios a worker takes per request
    pub batch_size: usize,
    /// Seed for a reproducible shuffle
    pub seed: Option<u64>,
}

/// Everything known about a finished run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub discovered: usize,
    pub plan: Option<RunPlan>,
    pub summary: RunSummary,
    /// Whether the queue was empty once all workers finished
    pub queue_drained: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }
}

pub struct Orchestrator {
    queue: Arc<dyn WorkQueue>,
    discovery: Box<dyn Discovery>,
    pool: WorkerPool,
    env_spec: EnvSpec,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        discovery: Box<dyn Discovery>,
        pool: WorkerPool,
        env_spec: EnvSpec,
        options: RunOptions,
    ) -> Self {
        Self {
            queue,
            discovery,
            pool,
            env_spec,
            options,
        }
    }

    /// Execute the full run
    pub async fn run(&self) -> Result<RunReport, OrchestratorError> {
        let started_at = Utc::now();
        let total = Timer::start("Run");

        // A leftover queue may belong to another invocation still in progress
        if !self.queue.is_empty().await? {
            error!("Queue '{}' is not empty", self.queue.name());
            return Err(OrchestratorError::QueueNotEmpty(
                self.queue.name().to_string(),
            ));
        }

        let timer = Timer::start("Generating all tests");
        let discovered = self.discovery.discover(&self.options.selection_args).await?;
        timer.stop();

        if discovered.is_empty() {
            warn!("No scenarios were discovered, nothing to run");
            return Ok(RunReport {
                discovered: 0,
                plan: None,
                summary: RunSummary::new(&ResultSet::new(), &discovered),
                queue_drained: true,
                started_at,
                finished_at: Utc::now(),
            });
        }

        let tests = self.shuffle(&discovered);
        let plan = self.plan(tests.len())?;

        let tasks = (0..plan.workers)
            .map(|index| {
                environment::derive(&self.env_spec, index).map(|env| WorkerTask {
                    index,
                    batch_size: plan.batch_size,
                    env,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Adding {} tests to Queue", tests.len());
        self.queue.enqueue_all(&tests).await?;

        let reports = self.pool.dispatch(tasks).await;

        let mut results = ResultSet::new();
        for report in reports {
            let index = report.index;
            for collision in results.merge(report.into_outcomes()) {
                error!(worker = index, "Merge collision: {}", collision);
            }
        }

        let summary = RunSummary::new(&results, &discovered);
        if !summary.not_run.is_empty() {
            error!("Tests {} were not run", summary.not_run.join(" "));
        }

        let queue_drained = match self.queue.is_empty().await {
            Ok(empty) => empty,
            Err(e) => {
                error!("Failed to check queue '{}': {}", self.queue.name(), e);
                false
            }
        };
        if !queue_drained {
            error!("Queue {} is not empty", self.queue.name());
        }

        for line in summary.to_string().lines() {
            info!("{}", line);
        }

        info!("Took {}", minutes_seconds(total.elapsed()));

        Ok(RunReport {
            discovered: discovered.len(),
            plan: Some(plan),
            summary,
            queue_drained,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Randomize execution order once, before enqueue
    fn shuffle(&self, discovered: &BTreeSet<ScenarioId>) -> Vec<ScenarioId> {
        let mut tests: Vec<ScenarioId> = discovered.iter().cloned().collect();
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        tests.shuffle(&mut rng);
        tests
    }

    /// Decide worker count and batch size for `total` scenarios
    fn plan(&self, total: usize) -> Result<RunPlan, EnvError> {
        let requested = if self.options.workers == 0 {
            let inferred = self.env_spec.infer_worker_count()?;
            info!("Inferred worker count {} from env_variables option", inferred);
            inferred
        } else {
            self.options.workers
        };

        let plan = RunPlan::new(requested, self.options.batch_size, total);

        if plan.clamped {
            info!(
                "Number of workers was overridden to {}. Was requested more workers ({}) than tests ({})",
                plan.workers, requested, total
            );
        }
        if plan.batch_size != self.options.batch_size {
            info!(
                "Batch size was overridden to {}. Presumably it will be more optimal for {} tests and {} workers than {}",
                plan.batch_size, total, plan.workers, self.options.batch_size
            );
        }

        Ok(plan)
    }
}
