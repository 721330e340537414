//! Scenario outcome models
//!
//! Defines scenario outcomes, the merged result set and the run summary.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Opaque identifier of one runnable scenario, e.g. `features/login.feature:12`
pub type ScenarioId = String;

/// Outcomes reported by a single worker
pub type OutcomeMap = HashMap<ScenarioId, Outcome>;

/// Final status of a scenario
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Pending,
    Undefined,
    Unknown,
}

impl Outcome {
    /// Every outcome, in reporting order
    pub const ALL: [Outcome; 6] = [
        Outcome::Passed,
        Outcome::Failed,
        Outcome::Skipped,
        Outcome::Pending,
        Outcome::Undefined,
        Outcome::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Pending => "pending",
            Outcome::Undefined => "undefined",
            Outcome::Unknown => "unknown",
        }
    }

    /// Whether this outcome fails the whole run
    pub fn fails_run(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Unknown)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

/// Same scenario reported by two workers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCollision {
    pub scenario: ScenarioId,
    /// Outcome kept in the result set
    pub kept: Outcome,
    /// Outcome reported later and discarded
    pub discarded: Outcome,
}

impl fmt::Display for MergeCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reported twice (kept {}, discarded {})",
            self.scenario, self.kept, self.discarded
        )
    }
}

/// Outcomes merged from every worker
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    outcomes: BTreeMap<ScenarioId, Outcome>,
    collisions: Vec<MergeCollision>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one worker's outcomes.
    ///
    /// A scenario already present keeps its first outcome; the duplicate is
    /// recorded as a collision and returned.
    pub fn merge(&mut self, partial: OutcomeMap) -> Vec<MergeCollision> {
        let mut collisions = Vec::new();

        for (scenario, outcome) in partial {
            match self.outcomes.get(&scenario) {
                Some(&kept) => collisions.push(MergeCollision {
                    scenario,
                    kept,
                    discarded: outcome,
                }),
                None => {
                    self.outcomes.insert(scenario, outcome);
                }
            }
        }

        self.collisions.extend(collisions.iter().cloned());
        collisions
    }

    pub fn collisions(&self) -> &[MergeCollision] {
        &self.collisions
    }

    /// Scenarios that were discovered but never reported
    pub fn not_run<'a>(&self, discovered: impl IntoIterator<Item = &'a ScenarioId>) -> Vec<ScenarioId> {
        let mut missing: Vec<ScenarioId> = discovered
            .into_iter()
            .filter(|s| !self.outcomes.contains_key(*s))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Scenarios with the given outcome, sorted
    pub fn with_outcome(&self, outcome: Outcome) -> Vec<ScenarioId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| **o == outcome)
            .map(|(s, _)| s.clone())
            .collect()
    }
}

/// Read-only classification of a finished run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub groups: BTreeMap<Outcome, Vec<ScenarioId>>,
    pub not_run: Vec<ScenarioId>,
    pub collisions: Vec<MergeCollision>,
}

impl RunSummary {
    pub fn new(results: &ResultSet, discovered: &BTreeSet<ScenarioId>) -> Self {
        let groups = Outcome::ALL
            .into_iter()
            .map(|outcome| (outcome, results.with_outcome(outcome)))
            .collect();

        Self {
            groups,
            not_run: results.not_run(discovered),
            collisions: results.collisions().to_vec(),
        }
    }

    pub fn scenarios(&self, outcome: Outcome) -> &[ScenarioId] {
        self.groups.get(&outcome).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.scenarios(outcome).len()
    }

    pub fn is_success(&self) -> bool {
        self.not_run.is_empty()
            && self.collisions.is_empty()
            && Outcome::ALL
                .iter()
                .filter(|o| o.fails_run())
                .all(|o| self.scenarios(*o).is_empty())
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in Outcome::ALL {
            let scenarios = self.scenarios(outcome);
            if !scenarios.is_empty() {
                writeln!(
                    f,
                    "Total: {} tests ({}): {}",
                    outcome,
                    self.count(outcome),
                    scenarios.join(" ")
                )?;
            }
        }
        if !self.not_run.is_empty() {
            writeln!(
                f,
                "Total: NOT RUN tests ({}): {}",
                self.not_run.len(),
                self.not_run.join(" ")
            )?;
        }
        Ok(())
    }
}
