//! Single-test execution: init hooks, HTTP call, checks
//!
//! The request is rewritten in place by the hooks and the received response
//! is stored on the test, so a failed test can be rendered afterwards with
//! exactly what went over the wire.

use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header::{HeaderName, HeaderValue};

use reqsuite_core::{CheckError, DataContext, HookError, RequestSpec, ResponseSnapshot, Test};

/// Run one test against `ctx`.
///
/// Stops at the first failing hook or check.
///
/// # Errors
///
/// Returns the hook, request-building, transport or check error that failed
/// the test.
pub fn execute(client: &Client, ctx: &DataContext, test: &mut Test) -> Result<(), ExecutionError> {
    for invocation in &test.hooks {
        invocation
            .hook
            .prepare(ctx, &mut test.request, &invocation.data)
            .map_err(|source| ExecutionError::Hook {
                id: invocation.id.clone(),
                source,
            })?;
    }

    let response = test.response.insert(send(client, &test.request)?);

    for check in &test.checks {
        check
            .check(ctx, response)
            .map_err(|source| ExecutionError::Check {
                kind: check.kind(),
                source,
            })?;
    }
    Ok(())
}

/// Run one test outside a suite. A fresh context is created when `ctx` is
/// `None` or detached.
///
/// # Errors
///
/// See [`execute`].
pub fn run_test(
    client: &Client,
    test: &mut Test,
    ctx: Option<&DataContext>,
) -> Result<(), ExecutionError> {
    let ctx = active_context(ctx);
    execute(client, &ctx, test)
}

/// The supplied context when it is active, otherwise a new one.
#[must_use]
pub fn active_context(ctx: Option<&DataContext>) -> DataContext {
    match ctx {
        Some(ctx) if ctx.is_active() => ctx.clone(),
        _ => DataContext::new(),
    }
}

fn send(client: &Client, request: &RequestSpec) -> Result<ResponseSnapshot, ExecutionError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| ExecutionError::InvalidRequest(format!("invalid HTTP method '{}'", request.method)))?;
    let url = reqwest::Url::parse(&request.url)
        .map_err(|e| ExecutionError::InvalidRequest(format!("invalid URL '{}': {e}", request.url)))?;

    let mut req = client.request(method, url);
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ExecutionError::InvalidRequest(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ExecutionError::InvalidRequest(format!("invalid value for header '{name}'"))
        })?;
        req = req.header(name, value);
    }
    if !request.body.is_empty() {
        req = req.body(request.body.clone());
    }

    let start = Instant::now();
    let resp = req
        .send()
        .map_err(|e| ExecutionError::Transport(e.to_string()))?;

    let status = resp.status();
    let headers = resp
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = resp
        .bytes()
        .map_err(|e| ExecutionError::Transport(format!("reading response body: {e}")))?;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(ResponseSnapshot {
        status_code: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body: body.to_vec(),
        latency_ms,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("init hook `{id}` failed: {source}")]
    Hook { id: String, source: HookError },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("failed `{kind}` check: {source}")]
    Check {
        kind: &'static str,
        source: CheckError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqsuite_core::{Check, HookInvocation, Registry};
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn client() -> Client {
        Client::new()
    }

    #[test]
    fn invalid_method_rejected_before_sending() {
        let mut test = Test::new("bad", RequestSpec::new("NOT A METHOD", "http://127.0.0.1:1/"));
        let err = execute(&client(), &DataContext::new(), &mut test).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidRequest(_)), "{err}");
        assert!(test.response.is_none());
    }

    #[test]
    fn invalid_header_rejected() {
        let mut test = Test::new(
            "bad",
            RequestSpec::new("GET", "http://127.0.0.1:1/").with_header("X-Bad", "a\nb"),
        );
        let err = execute(&client(), &DataContext::new(), &mut test).unwrap_err();
        assert_eq!(err.to_string(), "invalid request: invalid value for header 'x-bad'");
    }

    #[test]
    fn hook_failure_names_the_hook() {
        let registry = Registry::with_builtin_hooks();
        let hook = registry.hook("urlReplacements").unwrap();
        let data: Map<String, serde_json::Value> =
            json!({":x:": 5}).as_object().cloned().unwrap_or_default();
        let mut test = Test::new("t", RequestSpec::new("GET", "http://127.0.0.1:1/:x:"))
            .with_hook(HookInvocation::new("urlReplacements", hook, data))
            .with_check(Check::StatusCodeEqual { value: 200 });

        let err = execute(&client(), &DataContext::new(), &mut test).unwrap_err();
        assert!(matches!(err, ExecutionError::Hook { ref id, .. } if id == "urlReplacements"));
        assert!(test.response.is_none());
    }

    #[test]
    fn hooks_rewrite_request_in_place() {
        let hook: Arc<dyn reqsuite_core::RequestHook> = Arc::new(reqsuite_core::Replacements::Url);
        let data: Map<String, serde_json::Value> =
            json!({":port:": "1"}).as_object().cloned().unwrap_or_default();
        let mut test = Test::new("t", RequestSpec::new("NOT A METHOD", "http://127.0.0.1::port:/"))
            .with_hook(HookInvocation::new("urlReplacements", hook, data));

        let _ = execute(&client(), &DataContext::new(), &mut test);
        assert_eq!(test.request.url, "http://127.0.0.1:1/");
    }

    #[test]
    fn active_context_reused_or_created() {
        let ctx = DataContext::new();
        ctx.set("k", json!(1)).unwrap();
        assert_eq!(active_context(Some(&ctx)).get("k"), Some(json!(1)));
        assert!(active_context(None).is_active());
        assert!(active_context(Some(&DataContext::detached())).is_active());
    }
}
