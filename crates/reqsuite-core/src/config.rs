//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on simultaneously executing tests.
pub const DEFAULT_MAX_CONCURRENT_TESTS: usize = 5;

/// Default HTTP client timeout, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL used by tests that leave `request.base` empty
    pub base_url: String,

    /// Directories containing test documents
    pub tests: Vec<PathBuf>,

    /// Maximum tests executing at once; 0 means the default
    pub max_concurrent_tests: usize,

    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,

    /// Only run these groups (empty = all)
    pub groups: Vec<String>,

    /// Never run these groups
    pub ignore_groups: Vec<String>,

    /// Skip the rest of a group once one of its tests fails
    pub ignore_group_on_failure: bool,

    /// Skip everything once any test fails
    pub ignore_all_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            tests: vec![PathBuf::from("tests")],
            max_concurrent_tests: DEFAULT_MAX_CONCURRENT_TESTS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            groups: Vec::new(),
            ignore_groups: Vec::new(),
            ignore_group_on_failure: false,
            ignore_all_on_failure: false,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.reqsuite.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be loaded
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_default_in(Path::new("."))
    }

    /// Load from the first default candidate found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be loaded
    pub fn load_default_in(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".reqsuite.toml", ".reqsuite.json", "reqsuite.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Concurrency cap with 0 mapped to the default.
    #[must_use]
    pub const fn effective_max_concurrent_tests(&self) -> usize {
        if self.max_concurrent_tests == 0 {
            DEFAULT_MAX_CONCURRENT_TESTS
        } else {
            self.max_concurrent_tests
        }
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Create example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# reqsuite configuration

# Base URL for tests whose request.base is empty
base_url = "http://localhost:8080"

# Directories containing test documents (*.json, *.yaml, *.yml; files starting with "_" are ignored)
tests = ["tests"]

# Maximum number of tests executing at once
max_concurrent_tests = 5

# HTTP client timeout in seconds
http_timeout_secs = 5

# Only run these groups (empty = all)
# groups = ["users", "orders"]

# Never run these groups
# ignore_groups = ["slow"]

# Skip the rest of a group once one of its tests fails
ignore_group_on_failure = false

# Skip all remaining tests once any test fails
ignore_all_on_failure = false
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
