//! Dry run plan types and config validation
//!
//! Describes what a run *would* do without sending any requests.
//! Used for pre-flight validation and CI previews.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Config;

// ── Plan types ──

/// Complete dry run plan: groups, order buckets, and config validations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionPlan {
    /// Groups in execution order
    pub groups: Vec<GroupPlan>,
    /// Tests that would be dispatched
    pub total_tests: usize,
    /// Tests removed by the group allow/deny lists
    pub filtered_out: usize,
    /// Config validation results
    pub validations: Vec<Validation>,
}

/// One group's order buckets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GroupPlan {
    pub group: String,
    /// Buckets in ascending order; orders with no tests are absent
    pub orders: Vec<OrderPlan>,
}

/// Tests sharing one order value; they run concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderPlan {
    pub order: u32,
    /// Test names in first-seen order
    pub tests: Vec<String>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl Validation {
    fn new(check: &str, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
        }
    }
}

// ── Config validation ──

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    // Base URL
    if config.base_url.starts_with("http://") || config.base_url.starts_with("https://") {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Ok,
            format!("base_url: {}", config.base_url),
        ));
    } else {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Warning,
            format!(
                "base_url: {} (missing http:// or https:// prefix)",
                config.base_url
            ),
        ));
    }

    // Test directories
    if config.tests.is_empty() {
        checks.push(Validation::new(
            "tests",
            ValidationStatus::Error,
            "tests: no directories configured",
        ));
    }
    for dir in &config.tests {
        if dir.is_dir() {
            checks.push(Validation::new(
                "tests",
                ValidationStatus::Ok,
                format!("tests: {} (exists)", dir.display()),
            ));
        } else {
            checks.push(Validation::new(
                "tests",
                ValidationStatus::Error,
                format!("tests: {} (not a directory)", dir.display()),
            ));
        }
    }

    // Concurrency and timeout
    checks.push(Validation::new(
        "max_concurrent_tests",
        ValidationStatus::Ok,
        format!(
            "max_concurrent_tests: {}",
            config.effective_max_concurrent_tests()
        ),
    ));
    if config.http_timeout_secs == 0 {
        checks.push(Validation::new(
            "http_timeout_secs",
            ValidationStatus::Warning,
            "http_timeout_secs: 0 (every request will time out immediately)",
        ));
    }

    // Group filters
    for group in &config.groups {
        if config.ignore_groups.contains(group) {
            checks.push(Validation::new(
                "groups",
                ValidationStatus::Warning,
                format!("groups: `{group}` is both selected and ignored"),
            ));
        }
    }

    if config.ignore_all_on_failure && config.ignore_group_on_failure {
        checks.push(Validation::new(
            "failure_policy",
            ValidationStatus::Warning,
            "ignore_group_on_failure is redundant with ignore_all_on_failure",
        ));
    }

    checks
}

// ── Display helpers ──

impl ExecutionPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} groups, {} tests planned ({} filtered out)\n",
            self.groups.len(),
            self.total_tests,
            self.filtered_out,
        ));

        for group in &self.groups {
            let count: usize = group.orders.iter().map(|o| o.tests.len()).sum();
            lines.push(format!("{} ({count} tests):", group.group));
            for order in &group.orders {
                lines.push(format!("  [{}] {}", order.order, order.tests.join(", ")));
            }
            lines.push(String::new());
        }

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn find<'a>(checks: &'a [Validation], name: &str) -> Vec<&'a Validation> {
        checks.iter().filter(|c| c.check == name).collect()
    }

    #[test]
    fn validate_bad_base_url() {
        let cfg = Config {
            base_url: "localhost:8080".into(),
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        assert_eq!(find(&checks, "base_url")[0].status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_missing_test_dir() {
        let cfg = Config {
            tests: vec![PathBuf::from("does/not/exist")],
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        assert_eq!(find(&checks, "tests")[0].status, ValidationStatus::Error);
    }

    #[test]
    fn validate_existing_test_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            tests: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        assert!(
            checks.iter().all(|c| c.status == ValidationStatus::Ok),
            "{checks:?}"
        );
    }

    #[test]
    fn validate_conflicting_filters() {
        let cfg = Config {
            groups: vec!["users".into()],
            ignore_groups: vec!["users".into()],
            ignore_group_on_failure: true,
            ignore_all_on_failure: true,
            ..Config::default()
        };
        let checks = validate_config(&cfg);
        assert_eq!(find(&checks, "groups").len(), 1);
        assert_eq!(find(&checks, "failure_policy").len(), 1);
    }

    #[test]
    fn plan_terminal_output() {
        let plan = ExecutionPlan {
            groups: vec![GroupPlan {
                group: "users".into(),
                orders: vec![
                    OrderPlan {
                        order: 0,
                        tests: vec!["create user".into(), "create admin".into()],
                    },
                    OrderPlan {
                        order: 2,
                        tests: vec!["get user".into()],
                    },
                ],
            }],
            total_tests: 3,
            filtered_out: 1,
            validations: vec![Validation::new(
                "base_url",
                ValidationStatus::Ok,
                "base_url: http://localhost:8080",
            )],
        };

        insta::assert_snapshot!(plan.to_terminal(), @r"
        Dry run: 1 groups, 3 tests planned (1 filtered out)

        users (3 tests):
          [0] create user, create admin
          [2] get user

        Config validation:
          [OK] base_url: http://localhost:8080
        ");
        assert!(!plan.has_errors());
        assert!(!plan.has_warnings());
    }

    #[test]
    fn plan_json_serialization() {
        let plan = ExecutionPlan::default();
        let json = serde_json::to_string(&plan).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["total_tests"], 0);
        assert!(parsed["groups"].as_array().unwrap().is_empty());
    }
}
