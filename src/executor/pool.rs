//! Worker pool
//!
//! Starts every worker concurrently and waits for all of them. A failing
//! worker never cancels the others.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};

use super::worker::{describe, WorkerError, WorkerRunner, WorkerTask};
use crate::models::OutcomeMap;

/// Result of one worker
#[derive(Debug)]
pub struct WorkerReport {
    pub index: usize,
    pub result: Result<OutcomeMap, WorkerError>,
}

impl WorkerReport {
    /// Outcomes of the worker; a failed worker contributes none
    pub fn into_outcomes(self) -> OutcomeMap {
        self.result.unwrap_or_default()
    }
}

/// Fixed-size pool of workers
pub struct WorkerPool {
    runner: Arc<dyn WorkerRunner>,
    delay: Duration,
}

impl WorkerPool {
    pub fn new(runner: Arc<dyn WorkerRunner>) -> Self {
        Self {
            runner,
            delay: Duration::ZERO,
        }
    }

    /// Stagger worker `i` to start `i * delay` after the first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run every task and wait for all of them
    pub async fn dispatch(&self, tasks: Vec<WorkerTask>) -> Vec<WorkerReport> {
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let index = task.index;
            if !self.delay.is_zero() && index > 0 {
                info!(
                    "Waiting {:.1} seconds before starting worker {}",
                    self.delay.as_secs_f64(),
                    index
                );
                sleep(self.delay).await;
            }

            let runner = self.runner.clone();
            let handle = tokio::spawn(
                async move {
                    info!("Starting worker");
                    let result = runner.run(task).await;
                    match &result {
                        Ok(outcomes) => info!(
                            "Worker reported {} scenarios ({})",
                            outcomes.len(),
                            describe(outcomes)
                        ),
                        Err(e) => error!("{}", e),
                    }
                    result
                }
                .instrument(info_span!("worker", index)),
            );

            handles.push((index, handle));
        }

        let (indices, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(indices)
            .map(|(joined, index)| WorkerReport {
                index,
                result: joined.unwrap_or_else(|e| {
                    error!(worker = index, "Worker task failed: {}", e);
                    Err(WorkerError::Panicked {
                        index,
                        message: e.to_string(),
                    })
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Reports one passed scenario named after the worker, or fails on odd indices
    struct EchoRunner {
        fail_odd: bool,
        started: Mutex<Vec<(usize, Instant)>>,
    }

    impl EchoRunner {
        fn new(fail_odd: bool) -> Self {
            Self {
                fail_odd,
                started: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkerRunner for EchoRunner {
        async fn run(&self, task: WorkerTask) -> Result<OutcomeMap, WorkerError> {
            self.started.lock().unwrap().push((task.index, Instant::now()));
            if self.fail_odd && task.index % 2 == 1 {
                return Err(WorkerError::Exited {
                    index: task.index,
                    status: "exit status: 1".to_string(),
                });
            }
            Ok([(format!("worker-{}:1", task.index), Outcome::Passed)]
                .into_iter()
                .collect())
        }
    }

    fn tasks(count: usize) -> Vec<WorkerTask> {
        (0..count)
            .map(|index| WorkerTask {
                index,
                batch_size: 1,
                env: Default::default(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_all() {
        let pool = WorkerPool::new(Arc::new(EchoRunner::new(false)));
        let reports = pool.dispatch(tasks(4)).await;

        assert_eq!(reports.len(), 4);
        for (i, report) in reports.into_iter().enumerate() {
            assert_eq!(report.index, i);
            let outcomes = report.into_outcomes();
            assert_eq!(outcomes[&format!("worker-{i}:1")], Outcome::Passed);
        }
    }

    #[tokio::test]
    async fn test_failed_worker_does_not_cancel_others() {
        let pool = WorkerPool::new(Arc::new(EchoRunner::new(true)));
        let reports = pool.dispatch(tasks(3)).await;

        assert!(reports[0].result.is_ok());
        assert!(matches!(reports[1].result, Err(WorkerError::Exited { index: 1, .. })));
        assert!(reports[2].result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_stagger() {
        let runner = Arc::new(EchoRunner::new(false));
        let pool = WorkerPool::new(runner.clone()).with_delay(Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        pool.dispatch(tasks(3)).await;

        // Two gaps of two seconds between three workers
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert_eq!(runner.started.lock().unwrap().len(), 3);
    }
}
