//! Request-initialization hooks
//!
//! Hooks run in order before a request is sent and may rewrite it. Each
//! invocation receives the per-hook data from the test document.

use serde_json::{Map, Value};

use crate::context::DataContext;
use crate::model::RequestSpec;
use crate::template::{self, TemplateError};

/// Rewrites a request before dispatch.
pub trait RequestHook: Send + Sync {
    /// # Errors
    ///
    /// A failing hook aborts the test it belongs to.
    fn prepare(
        &self,
        ctx: &DataContext,
        request: &mut RequestSpec,
        data: &Map<String, Value>,
    ) -> Result<(), HookError>;
}

impl<F> RequestHook for F
where
    F: Fn(&DataContext, &mut RequestSpec, &Map<String, Value>) -> Result<(), HookError>
        + Send
        + Sync,
{
    fn prepare(
        &self,
        ctx: &DataContext,
        request: &mut RequestSpec,
        data: &Map<String, Value>,
    ) -> Result<(), HookError> {
        self(ctx, request, data)
    }
}

/// Built-in templating hooks, registered under fixed identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacements {
    /// URL, headers and body
    All,
    Url,
    Headers,
    Body,
}

impl Replacements {
    pub const ALL: [Self; 4] = [Self::All, Self::Url, Self::Headers, Self::Body];

    /// Registry identifier
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::All => "replacements",
            Self::Url => "urlReplacements",
            Self::Headers => "headerReplacements",
            Self::Body => "bodyReplacements",
        }
    }
}

impl RequestHook for Replacements {
    fn prepare(
        &self,
        ctx: &DataContext,
        request: &mut RequestSpec,
        data: &Map<String, Value>,
    ) -> Result<(), HookError> {
        match self {
            Self::All => template::apply_replacements(ctx, request, data)?,
            Self::Url => template::apply_url_replacements(ctx, request, data)?,
            Self::Headers => template::apply_header_replacements(ctx, request, data)?,
            Self::Body => template::apply_body_replacements(ctx, request, data)?,
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn header_hook_only_touches_headers() {
        let ctx = DataContext::new();
        let mut req = RequestSpec::new("GET", "https://x.com/:t:")
            .with_header("Authorization", "Bearer :t:")
            .with_body(":t:");
        Replacements::Headers
            .prepare(&ctx, &mut req, &data(json!({":t:": "abc"})))
            .unwrap();
        assert_eq!(req.url, "https://x.com/:t:");
        assert_eq!(req.header("Authorization"), Some("Bearer abc"));
        assert_eq!(req.body, b":t:");
    }

    #[test]
    fn closures_are_hooks() {
        let hook = |_: &DataContext,
                    req: &mut RequestSpec,
                    data: &Map<String, Value>|
         -> Result<(), HookError> {
            let token = data
                .get("token")
                .and_then(Value::as_str)
                .ok_or_else(|| HookError::Failed("missing token".into()))?;
            req.headers.push(("Authorization".into(), format!("Bearer {token}")));
            Ok(())
        };
        let ctx = DataContext::new();
        let mut req = RequestSpec::new("GET", "https://x.com");
        hook.prepare(&ctx, &mut req, &data(json!({"token": "t"}))).unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer t"));

        let err = hook.prepare(&ctx, &mut req, &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing token");
    }

    #[test]
    fn ids_are_distinct() {
        let ids: std::collections::HashSet<_> = Replacements::ALL.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 4);
    }
}
