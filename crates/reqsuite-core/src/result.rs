//! Run results: counters, per-test outcomes and the final summary

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Four-counter summary of a run (or of one group within a run).
///
/// Invariant: `executed == passed + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunResult {
    pub executed: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl RunResult {
    /// Record a single test outcome.
    pub fn record(&mut self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Passed => {
                self.executed += 1;
                self.passed += 1;
            }
            TestOutcome::Failed => {
                self.executed += 1;
                self.failed += 1;
            }
            TestOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Add another result's counters to this one.
    pub fn absorb(&mut self, other: &Self) {
        self.executed += other.executed;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Tests that were either executed or skipped.
    #[must_use]
    pub const fn accounted(&self) -> u64 {
        self.executed + self.skipped
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code: 0 when nothing failed, 1 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "executed={} passed={} failed={} skipped={}",
            self.executed, self.passed, self.failed, self.skipped
        )
    }
}

/// What happened to one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

/// A failed test with its error and rendered request/response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailureReport {
    pub name: String,
    pub group: String,
    pub order: u32,
    /// Error that failed the test
    pub error: String,
    /// Rendered request (and response, when one was received)
    pub diagnostic: String,
}

/// Final result of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    /// Sum over all groups
    pub totals: RunResult,
    /// Per-group counters, sorted by group name
    pub groups: BTreeMap<String, RunResult>,
    pub failures: Vec<FailureReport>,
}

impl RunSummary {
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.totals.exit_code()
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        for failure in &self.failures {
            lines.push(format!(
                "FAIL {} [{}#{}]: {}",
                failure.name, failure.group, failure.order, failure.error
            ));
            for line in failure.diagnostic.lines() {
                lines.push(format!("  {line}"));
            }
            lines.push(String::new());
        }

        for (group, result) in &self.groups {
            lines.push(format!("{group}: {result}"));
        }
        lines.push(format!("Total: {}", self.totals));

        lines.join("\n")
    }
}
