//! Operator-facing rendering of a failed test's request and response
//!
//! ```text
//! POST http://localhost:8080/users
//! Body:
//! {"name":"Tom"}
//! Headers:
//! 	Content-Type: application/json
//! ```

use crate::model::{RequestSpec, ResponseSnapshot, Test};

/// Headers that are masked when masking is enabled.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Mask value for redacted headers.
const MASK: &str = "***";

/// Returns true if the header name matches a known sensitive header (case-insensitive).
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|&h| name.eq_ignore_ascii_case(h))
}

/// Render a request: start line, then the body and headers when present.
#[must_use]
pub fn format_request(request: &RequestSpec, mask: bool) -> String {
    render(
        &format!("{} {}", request.method, request.url),
        &request.body,
        &request.headers,
        mask,
    )
}

/// Render a response the same way, with the status line as the start line.
#[must_use]
pub fn format_response(response: &ResponseSnapshot, mask: bool) -> String {
    render(
        &response.status_line(),
        &response.body,
        &response.headers,
        mask,
    )
}

/// Render a test's request and, when one was received, its response.
#[must_use]
pub fn format_test(test: &Test, mask: bool) -> String {
    let mut out = format!("Request:\n{}", format_request(&test.request, mask));
    if let Some(response) = &test.response {
        out.push_str("\nResponse:\n");
        out.push_str(&format_response(response, mask));
    }
    out
}

/// One `\n\tName: value` line per header.
#[must_use]
pub fn format_headers(headers: &[(String, String)], mask: bool) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if mask && is_sensitive_header(name) {
                MASK
            } else {
                value.as_str()
            };
            format!("\n\t{name}: {value}")
        })
        .collect()
}

fn render(start: &str, body: &[u8], headers: &[(String, String)], mask: bool) -> String {
    let mut out = start.to_string();
    if !body.is_empty() {
        out.push_str("\nBody:\n");
        out.push_str(&String::from_utf8_lossy(body));
    }
    if !headers.is_empty() {
        out.push_str("\nHeaders:");
        out.push_str(&format_headers(headers, mask));
    }
    out
}
