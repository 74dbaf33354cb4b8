//! Bounded dispatcher
//!
//! Groups run one after another (sorted by name). Inside a group, order
//! buckets run ascending and each bucket is a barrier: every test at order
//! *k* finishes before any test at *k+1* starts. A bucket is drained by at
//! most `max_concurrent_tests` worker threads, each taking tests from a
//! shared queue in bucket order.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use reqsuite_core::config::DEFAULT_MAX_CONCURRENT_TESTS;
use reqsuite_core::plan::{ExecutionPlan, GroupPlan, OrderPlan};
use reqsuite_core::{
    Config, DataContext, FailureReport, RunSummary, Test, TestOutcome, diagnostic,
};

use crate::execute::{self, ExecutionError, active_context};
use crate::index::{GroupFilter, GroupIndex};
use crate::limiter::Limiter;
use crate::tally::{FailurePolicy, GroupTally, Tally};

/// Runs test suites against live HTTP endpoints.
#[derive(Debug, Clone)]
pub struct Runner {
    client: Client,
    max_concurrent_tests: usize,
    filter: GroupFilter,
    policy: FailurePolicy,
    mask_headers: bool,
}

impl Runner {
    /// A runner with default settings around an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_concurrent_tests: DEFAULT_MAX_CONCURRENT_TESTS,
            filter: GroupFilter::default(),
            policy: FailurePolicy::default(),
            mask_headers: false,
        }
    }

    /// Build a runner (and its HTTP client) from config.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, RunnerError> {
        let client = build_client(config.http_timeout())?;
        Ok(Self::new(client)
            .with_max_concurrent_tests(config.effective_max_concurrent_tests())
            .with_groups(config.groups.clone())
            .with_ignore_groups(config.ignore_groups.clone())
            .with_ignore_group_on_failure(config.ignore_group_on_failure)
            .with_ignore_all_on_failure(config.ignore_all_on_failure))
    }

    /// 0 means the default.
    #[must_use]
    pub fn with_max_concurrent_tests(mut self, max: usize) -> Self {
        self.max_concurrent_tests = if max == 0 {
            DEFAULT_MAX_CONCURRENT_TESTS
        } else {
            max
        };
        self
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.filter.allow = groups;
        self
    }

    #[must_use]
    pub fn with_ignore_groups(mut self, groups: Vec<String>) -> Self {
        self.filter.deny = groups;
        self
    }

    #[must_use]
    pub fn with_ignore_group_on_failure(mut self, ignore: bool) -> Self {
        self.policy.ignore_group_on_failure = ignore;
        self
    }

    #[must_use]
    pub fn with_ignore_all_on_failure(mut self, ignore: bool) -> Self {
        self.policy.ignore_all_on_failure = ignore;
        self
    }

    /// Mask sensitive headers in failure diagnostics.
    #[must_use]
    pub fn with_mask_headers(mut self, mask: bool) -> Self {
        self.mask_headers = mask;
        self
    }

    #[must_use]
    pub const fn max_concurrent_tests(&self) -> usize {
        self.max_concurrent_tests
    }

    /// Describe what [`Runner::run_all`] would do with `tests`.
    /// No HTTP requests are sent and validations are left empty.
    #[must_use]
    pub fn plan(&self, tests: &[Test]) -> ExecutionPlan {
        let (selected, filtered_out) = self.filter.apply(tests);
        let index = GroupIndex::build(selected);

        let groups = index
            .groups()
            .map(|(name, bucket)| GroupPlan {
                group: name.to_string(),
                orders: bucket
                    .orders()
                    .map(|(order, tests)| OrderPlan {
                        order,
                        tests: tests.iter().map(|t| t.name.clone()).collect(),
                    })
                    .collect(),
            })
            .collect();

        ExecutionPlan {
            groups,
            total_tests: index.len(),
            filtered_out,
            validations: Vec::new(),
        }
    }

    /// Run every test that passes the group filters.
    ///
    /// All tests share one data context: `ctx` when it is active, otherwise
    /// one created here for the whole run. Tests removed by the group filters
    /// are not counted at all.
    pub fn run_all(&self, tests: Vec<Test>, ctx: Option<&DataContext>) -> RunSummary {
        let ctx = active_context(ctx);
        let (selected, filtered_out) = self.filter.apply(tests);
        if filtered_out > 0 {
            debug!(filtered_out, "tests removed by group filters");
        }

        let index = GroupIndex::build(selected);
        let limiter = Limiter::new(self.max_concurrent_tests);
        let tally = Tally::default();

        info!(
            tests = index.len(),
            max_concurrent_tests = limiter.capacity(),
            "starting run"
        );

        for (group, bucket) in index.into_groups() {
            info!(group = %group, tests = bucket.len(), "running group");
            let group_tally = tally.group(&group);

            for (order, tests) in bucket.into_orders() {
                debug!(group = %group, order, tests = tests.len(), "running order");
                let workers = limiter.capacity().min(tests.len());
                let queue = Mutex::new(tests.into_iter());
                let (ctx, limiter, group_tally, queue) = (&ctx, &limiter, &group_tally, &queue);
                std::thread::scope(|scope| {
                    for _ in 0..workers {
                        scope.spawn(move || {
                            while let Some(test) = next_test(queue) {
                                self.dispatch(test, ctx, limiter, group_tally);
                            }
                        });
                    }
                });
            }

            let result = group_tally.finish();
            info!(group = %group, %result, "group finished");
        }

        let summary = tally.into_summary();
        info!(result = %summary.totals, "run finished");
        summary
    }

    /// Run a single test, creating a data context if none is active.
    ///
    /// # Errors
    ///
    /// Returns the error that failed the test.
    pub fn run_one(&self, test: &mut Test, ctx: Option<&DataContext>) -> Result<(), ExecutionError> {
        execute::run_test(&self.client, test, ctx)
    }

    fn dispatch(&self, mut test: Test, ctx: &DataContext, limiter: &Limiter, group: &GroupTally<'_>) {
        let _permit = limiter.acquire();

        if group.should_skip(self.policy) {
            info!(group = %test.group, order = test.order, test = %test.name, "skipping test after earlier failure");
            group.record(TestOutcome::Skipped);
            return;
        }

        debug!(group = %test.group, order = test.order, test = %test.name, "running test");
        match execute::execute(&self.client, ctx, &mut test) {
            Ok(()) => {
                debug!(group = %test.group, order = test.order, test = %test.name, "test passed");
                group.record(TestOutcome::Passed);
            }
            Err(e) => {
                let diagnostic = diagnostic::format_test(&test, self.mask_headers);
                warn!(
                    group = %test.group,
                    order = test.order,
                    test = %test.name,
                    error = %e,
                    "test failed\n{diagnostic}"
                );
                group.record_failure(FailureReport {
                    name: test.name,
                    group: test.group,
                    order: test.order,
                    error: e.to_string(),
                    diagnostic,
                });
            }
        }
    }
}

fn next_test(queue: &Mutex<std::vec::IntoIter<Test>>) -> Option<Test> {
    queue.lock().unwrap_or_else(PoisonError::into_inner).next()
}

/// Blocking HTTP client with the given timeout.
///
/// # Errors
///
/// Returns error if the client cannot be built (e.g. TLS backend failure).
pub fn build_client(timeout: Duration) -> Result<Client, RunnerError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RunnerError::Http(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("HTTP client error: {0}")]
    Http(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqsuite_core::RequestSpec;

    fn sample(name: &str, group: &str, order: i64) -> Test {
        Test::new(name, RequestSpec::new("GET", "http://127.0.0.1:1/"))
            .with_group(group)
            .with_order(order)
    }

    #[test]
    fn zero_concurrency_means_default() {
        let runner = Runner::new(Client::new()).with_max_concurrent_tests(0);
        assert_eq!(runner.max_concurrent_tests(), 5);
    }

    #[test]
    fn from_config_applies_settings() {
        let config = Config {
            max_concurrent_tests: 2,
            groups: vec!["a".into()],
            ignore_all_on_failure: true,
            ..Config::default()
        };
        let runner = Runner::from_config(&config).unwrap();
        assert_eq!(runner.max_concurrent_tests(), 2);
        assert!(runner.policy.ignore_all_on_failure);
        assert!(!runner.policy.ignore_group_on_failure);
        assert_eq!(runner.filter.allow, vec!["a"]);
    }

    #[test]
    fn plan_groups_and_filters() {
        let tests = vec![
            sample("second", "users", 3),
            sample("first", "users", 0),
            sample("also first", "users", 0),
            sample("login", "auth", 0),
            sample("slow", "perf", 0),
        ];
        let runner = Runner::new(Client::new()).with_ignore_groups(vec!["perf".into()]);
        let plan = runner.plan(&tests);

        assert_eq!(plan.total_tests, 4);
        assert_eq!(plan.filtered_out, 1);
        let groups: Vec<&str> = plan.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(groups, vec!["auth", "users"]);
        let users = &plan.groups[1];
        assert_eq!(users.orders[0].order, 0);
        assert_eq!(users.orders[0].tests, vec!["first", "also first"]);
        assert_eq!(users.orders[1].order, 3);
    }

    #[test]
    fn run_all_with_no_tests() {
        let summary = Runner::new(Client::new()).run_all(Vec::new(), None);
        assert_eq!(summary.totals, reqsuite_core::RunResult::default());
        assert!(summary.groups.is_empty());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn transport_failures_are_counted() {
        let tests = vec![sample("a", "g", 0), sample("b", "g", 1)];
        let summary = Runner::new(build_client(Duration::from_secs(1)).unwrap())
            .with_ignore_group_on_failure(true)
            .run_all(tests, None);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.skipped, 1);
        assert_eq!(summary.failures[0].name, "a");
        assert!(summary.failures[0].error.starts_with("HTTP error"));
        assert!(summary.failures[0].diagnostic.starts_with("Request:\nGET http://127.0.0.1:1/"));
    }
}
