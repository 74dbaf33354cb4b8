//! Test model: request specification, checks, init hooks and the captured response

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::check::Check;
use crate::hook::RequestHook;

/// Group used when a test document does not name one.
pub const DEFAULT_GROUP: &str = "default";

/// Name used when a test document does not name the test.
pub const UNKNOWN_TEST_NAME: &str = "unknown";

/// One named HTTP request plus its ordered checks.
///
/// Created by the parser and owned by the task that executes it.
/// `response` is filled exactly once, after the request has been sent.
#[derive(Debug)]
pub struct Test {
    pub name: String,
    pub group: String,
    pub order: u32,
    pub request: RequestSpec,
    pub checks: Vec<Check>,
    pub hooks: Vec<HookInvocation>,
    pub response: Option<ResponseSnapshot>,
}

impl Test {
    /// Create a test with no checks or hooks in the default group.
    #[must_use]
    pub fn new(name: impl Into<String>, request: RequestSpec) -> Self {
        Self {
            name: name.into(),
            group: DEFAULT_GROUP.to_string(),
            order: 0,
            request,
            checks: Vec::new(),
            hooks: Vec::new(),
            response: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.group = if group.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            group
        };
        self
    }

    /// Set the order; negative values clamp to 0.
    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = clamp_order(order);
        self
    }

    #[must_use]
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: HookInvocation) -> Self {
        self.hooks.push(hook);
        self
    }
}

/// Clamp a document order into the non-negative range.
#[must_use]
pub fn clamp_order(order: i64) -> u32 {
    u32::try_from(order.max(0)).unwrap_or(u32::MAX)
}

/// HTTP request before dispatch.
///
/// Headers keep their insertion order and may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl RequestSpec {
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP response as received, with the body fully buffered so every check
/// can read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    /// Canonical reason phrase, empty if unknown
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl ResponseSnapshot {
    #[must_use]
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            reason: String::new(),
            headers: Vec::new(),
            body: body.into(),
            latency_ms: 0,
        }
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Status line such as `404 Not Found`.
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status_code.to_string()
        } else {
            format!("{} {}", self.status_code, self.reason)
        }
    }
}

/// A resolved init hook and the data it is invoked with.
#[derive(Clone)]
pub struct HookInvocation {
    pub id: String,
    pub hook: Arc<dyn RequestHook>,
    pub data: Map<String, Value>,
}

impl HookInvocation {
    #[must_use]
    pub fn new(id: impl Into<String>, hook: Arc<dyn RequestHook>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            hook,
            data,
        }
    }
}

impl fmt::Debug for HookInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookInvocation")
            .field("id", &self.id)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
