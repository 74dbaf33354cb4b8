//! Test file discovery and loading
//!
//! A test directory contributes every `*.json`, `*.yaml` and `*.yml` file
//! whose name does not start with `_`. Files that fail to parse are logged
//! and left out; the rest still load.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use reqsuite_core::{ParseOptions, Test, parse_file};

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Test document paths in `dir`, sorted.
///
/// # Errors
///
/// Returns error if the directory cannot be read.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("cannot read test directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("cannot read test directory {}", dir.display()))?
            .path();
        if path.is_file() && is_test_document(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_test_document(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('_'));
    let known_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));
    !hidden && known_ext
}

/// Parsed tests plus the files that were rejected.
#[derive(Debug, Default)]
pub struct LoadedTests {
    pub tests: Vec<Test>,
    pub rejected: Vec<(PathBuf, String)>,
}

/// Discover and parse every test document in `dirs`.
///
/// # Errors
///
/// Returns error if a directory cannot be read. Invalid documents are not
/// errors; they are listed in [`LoadedTests::rejected`].
pub fn load_tests(dirs: &[PathBuf], options: &ParseOptions) -> Result<LoadedTests> {
    let mut loaded = LoadedTests::default();
    for dir in dirs {
        for path in discover(dir)? {
            match parse_file(&path, options) {
                Ok(test) => {
                    debug!(file = %path.display(), test = %test.name, group = %test.group, "loaded test");
                    loaded.tests.push(test);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping invalid test file");
                    loaded.rejected.push((path, e.to_string()));
                }
            }
        }
    }
    Ok(loaded)
}
