//! Shared work queue
//!
//! The orchestrator fills the queue once; workers drain it concurrently.

mod redis_queue;

pub use redis_queue::RedisQueue;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ScenarioId;

/// Work queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue connection error: {0}")]
    Connection(String),

    #[error("Queue command failed: {0}")]
    Command(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Operations the orchestrator needs from the shared queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Whether no identifiers are pending
    async fn is_empty(&self) -> QueueResult<bool>;

    /// Push every identifier in a single atomic operation
    async fn enqueue_all(&self, scenarios: &[ScenarioId]) -> QueueResult<()>;

    /// Queue name, for diagnostics
    fn name(&self) -> &str;
}
