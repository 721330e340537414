//! Data models for distributed scenario runs
//!
//! This module contains the outcome types shared by the orchestrator and workers.

mod outcome;

pub use outcome::{MergeCollision, Outcome, OutcomeMap, ResultSet, RunSummary, ScenarioId};
