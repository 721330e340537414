//! Worker execution
//!
//! Provides the worker pool and the process-backed worker.

mod pool;
mod worker;

pub use pool::{WorkerPool, WorkerReport};
pub use worker::{ProcessWorker, QueueParams, WorkerError, WorkerRunner, WorkerTask};
