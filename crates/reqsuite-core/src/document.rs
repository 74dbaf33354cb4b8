//! Raw test document types (version 1)
//!
//! These mirror the on-disk JSON/YAML layout exactly. [`crate::parse`]
//! turns them into executable [`crate::model::Test`] values.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A version 1 test document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestDocument {
    /// Document format version, must be 1
    pub version: i64,
    /// Test name, "unknown" if empty
    #[serde(default)]
    pub name: String,
    /// Group name, "default" if empty
    #[serde(default)]
    pub group: String,
    /// Order within the group; negative values clamp to 0
    #[serde(default)]
    pub order: i64,
    pub request: RequestDocument,
    /// Checks, run in order
    #[serde(default)]
    pub checks: Vec<CheckDocument>,
}

/// The HTTP request part of a test document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestDocument {
    /// Base URL; falls back to the configured base URL when empty
    #[serde(default)]
    pub base: String,
    /// HTTP method, GET if empty
    #[serde(default)]
    pub method: String,
    /// Path appended to the base URL
    #[serde(default)]
    pub path: String,
    /// Request body. JSON-encoded when Content-Type is application/json,
    /// otherwise it must be a string.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Init hook invocations: hook id → hook data
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub init: BTreeMap<String, BTreeMap<String, Value>>,
}

/// One `{type, data}` check entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckDocument {
    /// Check type, e.g. "statusCodeEqual"
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific data
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

/// Generate the JSON Schema for [`TestDocument`].
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(TestDocument);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
