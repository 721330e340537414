//! Worker count and batch size planning

use serde::{Deserialize, Serialize};

/// Worker count and batch size chosen for a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub workers: usize,
    pub batch_size: usize,
    /// Fewer workers than requested because there are fewer scenarios
    pub clamped: bool,
}

impl RunPlan {
    pub fn new(requested_workers: usize, batch_size: usize, total: usize) -> Self {
        let workers = clamp_workers(requested_workers, total);
        Self {
            workers,
            batch_size: normalize_batch_size(batch_size, workers, total),
            clamped: workers != requested_workers,
        }
    }
}

/// Never run more workers than there are scenarios
pub fn clamp_workers(requested: usize, total: usize) -> usize {
    requested.max(1).min(total)
}

/// Shrink a batch size that would leave every worker with one partial batch.
///
/// When `(batch - 1) * workers >= total` a single round of full batches
/// cannot be spread over all workers, so the batch becomes
/// `ceil(total / workers)`.
pub fn normalize_batch_size(batch: usize, workers: usize, total: usize) -> usize {
    let batch = batch.max(1);
    if workers == 0 || total == 0 {
        return batch;
    }
    // An overflowing product is certainly past `total`
    let idle = (batch - 1)
        .checked_mul(workers)
        .map_or(true, |n| n >= total);
    if idle {
        total.div_ceil(workers)
    } else {
        batch
    }
}
