//! Run results persistence

mod summary;

pub use summary::StoredRun;
