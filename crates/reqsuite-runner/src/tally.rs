//! Result aggregation and the failure-propagation (skip) policy
//!
//! Lock order is always overall, then group. The per-group result is folded
//! into the overall one only when the group finishes, so `ignore_all` sees
//! failures from earlier groups plus whatever the current group has recorded.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqsuite_core::{FailureReport, RunResult, RunSummary, TestOutcome};

/// When to skip a test instead of executing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Skip once a test in the same group has failed
    pub ignore_group_on_failure: bool,
    /// Skip once any test in the run has failed
    pub ignore_all_on_failure: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run-wide counters plus completed groups and failure reports.
#[derive(Debug, Default)]
pub struct Tally {
    overall: Mutex<RunResult>,
    groups: Mutex<BTreeMap<String, RunResult>>,
    failures: Mutex<Vec<FailureReport>>,
}

impl Tally {
    /// Start counting a group.
    #[must_use]
    pub fn group(&self, name: &str) -> GroupTally<'_> {
        GroupTally {
            tally: self,
            name: name.to_string(),
            result: Mutex::new(RunResult::default()),
        }
    }

    /// Sum of all finished groups.
    #[must_use]
    pub fn overall(&self) -> RunResult {
        *lock(&self.overall)
    }

    /// Failures are sorted by group, then order; ties keep completion order.
    #[must_use]
    pub fn into_summary(self) -> RunSummary {
        let mut failures = self
            .failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        failures.sort_by(|a, b| a.group.cmp(&b.group).then(a.order.cmp(&b.order)));

        RunSummary {
            totals: self
                .overall
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            groups: self
                .groups
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            failures,
        }
    }
}

/// Transient counters for the group currently being dispatched.
#[derive(Debug)]
pub struct GroupTally<'a> {
    tally: &'a Tally,
    name: String,
    result: Mutex<RunResult>,
}

impl GroupTally<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a test about to start should be skipped under `policy`.
    ///
    /// Only failures recorded before this call are visible; siblings still
    /// running in the same order bucket may fail afterwards.
    #[must_use]
    pub fn should_skip(&self, policy: FailurePolicy) -> bool {
        if policy.ignore_all_on_failure {
            let overall = lock(&self.tally.overall);
            let group = lock(&self.result);
            if overall.failed > 0 || group.failed > 0 {
                return true;
            }
        }
        if policy.ignore_group_on_failure {
            return lock(&self.result).failed > 0;
        }
        false
    }

    pub fn record(&self, outcome: TestOutcome) {
        lock(&self.result).record(&outcome);
    }

    /// Record a failed test along with its report.
    pub fn record_failure(&self, report: FailureReport) {
        self.record(TestOutcome::Failed);
        lock(&self.tally.failures).push(report);
    }

    #[must_use]
    pub fn result(&self) -> RunResult {
        *lock(&self.result)
    }

    /// Fold this group into the overall result and return the group's counters.
    pub fn finish(self) -> RunResult {
        let result = self
            .result
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        lock(&self.tally.overall).absorb(&result);
        lock(&self.tally.groups)
            .entry(self.name)
            .or_default()
            .absorb(&result);
        result
    }
}
