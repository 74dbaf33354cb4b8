//! Request templating: literal and data-context substitution
//!
//! A replacement map pairs a literal find-string with a specifier. String
//! specifiers are used verbatim and `null` becomes the empty string. A
//! resolved string that starts with a run of `$` / `.` characters is a
//! variable: the whole run is stripped and the rest is looked up in the
//! [`DataContext`].
//!
//! Map iteration order is not defined, so find-strings should not overlap.
//! Empty find-strings are ignored.

use serde_json::{Map, Value};

use crate::context::DataContext;
use crate::model::RequestSpec;

/// Characters that mark a specifier as a data-context variable.
const VARIABLE_PREFIX: [char; 2] = ['$', '.'];

/// Apply replacements to the URL, every header value and the body.
///
/// # Errors
///
/// Returns error if a specifier is neither a string nor `null`, or if the
/// rewritten URL no longer parses.
pub fn apply_replacements(
    ctx: &DataContext,
    request: &mut RequestSpec,
    data: &Map<String, Value>,
) -> Result<(), TemplateError> {
    let pairs = resolve_all(ctx, data)?;
    rewrite_url(request, &pairs)?;
    rewrite_headers(request, &pairs);
    rewrite_body(request, &pairs);
    Ok(())
}

/// Apply replacements to the full URL string only.
///
/// # Errors
///
/// See [`apply_replacements`].
pub fn apply_url_replacements(
    ctx: &DataContext,
    request: &mut RequestSpec,
    data: &Map<String, Value>,
) -> Result<(), TemplateError> {
    let pairs = resolve_all(ctx, data)?;
    rewrite_url(request, &pairs)
}

/// Apply replacements to header values only.
///
/// # Errors
///
/// Returns error if a specifier is neither a string nor `null`.
pub fn apply_header_replacements(
    ctx: &DataContext,
    request: &mut RequestSpec,
    data: &Map<String, Value>,
) -> Result<(), TemplateError> {
    let pairs = resolve_all(ctx, data)?;
    rewrite_headers(request, &pairs);
    Ok(())
}

/// Apply replacements to the body only.
///
/// # Errors
///
/// Returns error if a specifier is neither a string nor `null`.
pub fn apply_body_replacements(
    ctx: &DataContext,
    request: &mut RequestSpec,
    data: &Map<String, Value>,
) -> Result<(), TemplateError> {
    if request.body.is_empty() || data.is_empty() {
        return Ok(());
    }
    let pairs = resolve_all(ctx, data)?;
    rewrite_body(request, &pairs);
    Ok(())
}

/// Resolve one specifier to its replacement text.
///
/// # Errors
///
/// Returns [`TemplateError::UnsupportedValue`] for numbers, booleans,
/// arrays and objects.
pub fn resolve_replacement(ctx: &DataContext, specifier: &Value) -> Result<String, TemplateError> {
    let text = match specifier {
        Value::String(s) => s.as_str(),
        Value::Null => "",
        other => return Err(TemplateError::UnsupportedValue(other.to_string())),
    };

    let id = text.trim_start_matches(VARIABLE_PREFIX);
    if id.len() == text.len() {
        return Ok(text.to_string());
    }
    Ok(ctx.get_text(id))
}

fn resolve_all<'a>(
    ctx: &DataContext,
    data: &'a Map<String, Value>,
) -> Result<Vec<(&'a str, String)>, TemplateError> {
    data.iter()
        .filter(|(find, _)| !find.is_empty())
        .map(|(find, spec)| Ok((find.as_str(), resolve_replacement(ctx, spec)?)))
        .collect()
}

fn rewrite_url(request: &mut RequestSpec, pairs: &[(&str, String)]) -> Result<(), TemplateError> {
    let mut url = request.url.clone();
    for (find, replacement) in pairs {
        url = url.replace(find, replacement);
    }
    url::Url::parse(&url).map_err(|e| TemplateError::InvalidUrl {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    request.url = url;
    Ok(())
}

fn rewrite_headers(request: &mut RequestSpec, pairs: &[(&str, String)]) {
    for (_, value) in &mut request.headers {
        for (find, replacement) in pairs {
            *value = value.replace(find, replacement);
        }
    }
}

fn rewrite_body(request: &mut RequestSpec, pairs: &[(&str, String)]) {
    if request.body.is_empty() || pairs.is_empty() {
        return;
    }
    let mut body = std::mem::take(&mut request.body);
    for (find, replacement) in pairs {
        body = replace_bytes(&body, find.as_bytes(), replacement.as_bytes());
    }
    request.body = body;
}

/// Byte-level `str::replace`, so non-UTF-8 bodies survive untouched.
fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unhandled replacement value `{0}`: expected a string or null")]
    UnsupportedValue(String),
    #[error("replaced url `{url}` is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
}
