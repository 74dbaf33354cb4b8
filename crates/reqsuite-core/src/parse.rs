//! Test document parsing: raw documents into executable tests
//!
//! Every identifier (check type, hook id, custom check id) and every regex
//! is resolved here. A document that parses is ready to run; anything wrong
//! with it is a [`ParseError`], never a runtime failure.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde_json::{Map, Value};

use crate::check::Check;
use crate::document::{CheckDocument, RequestDocument, TestDocument};
use crate::model::{
    DEFAULT_GROUP, HookInvocation, RequestSpec, Test, UNKNOWN_TEST_NAME, clamp_order,
};
use crate::registry::Registry;

/// On-disk document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from the file extension; anything but yaml/yml is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Inputs the parser needs besides the document itself.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions<'a> {
    /// Used when a document leaves `request.base` empty
    pub base_url: &'a str,
    pub registry: &'a Registry,
}

/// Read and parse a test document from disk.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid test document.
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<Test, ParseError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ParseError::Io(format!("{}: {e}", path.display())))?;
    parse_document(&content, DocumentFormat::from_path(path), options)
}

/// Parse a test document from text.
///
/// # Errors
///
/// Returns error on malformed documents, unsupported versions, unknown check
/// types, unknown hook/custom check identifiers and invalid regexes.
pub fn parse_document(
    content: &str,
    format: DocumentFormat,
    options: &ParseOptions,
) -> Result<Test, ParseError> {
    let raw: Value = match format {
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| ParseError::Malformed(format!("invalid JSON: {e}")))?,
        DocumentFormat::Yaml => serde_yml::from_str(content)
            .map_err(|e| ParseError::Malformed(format!("invalid YAML: {e}")))?,
    };

    let version = raw.get("version").and_then(Value::as_i64).unwrap_or(0);
    match version {
        1 => {
            let doc: TestDocument = serde_json::from_value(raw)
                .map_err(|e| ParseError::Malformed(format!("invalid v1 document: {e}")))?;
            from_document(doc, options)
        }
        other => Err(ParseError::UnsupportedVersion(other)),
    }
}

/// Convert a raw v1 document into a [`Test`].
///
/// # Errors
///
/// See [`parse_document`].
pub fn from_document(doc: TestDocument, options: &ParseOptions) -> Result<Test, ParseError> {
    let request = build_request(&doc.request, options.base_url)?;

    let mut hooks = Vec::with_capacity(doc.request.init.len());
    for (id, data) in doc.request.init {
        let hook = options
            .registry
            .hook(&id)
            .ok_or_else(|| ParseError::UnknownHook(id.clone()))?;
        hooks.push(HookInvocation::new(id, hook, data.into_iter().collect()));
    }

    let mut checks = Vec::with_capacity(doc.checks.len());
    for (index, check) in doc.checks.iter().enumerate() {
        let parsed = parse_check(check, options.registry).map_err(|e| ParseError::Check {
            index,
            reason: e.to_string(),
        })?;
        checks.push(parsed);
    }

    Ok(Test {
        name: non_empty_or(doc.name, UNKNOWN_TEST_NAME),
        group: non_empty_or(doc.group, DEFAULT_GROUP),
        order: clamp_order(doc.order),
        request,
        checks,
        hooks,
        response: None,
    })
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn build_request(doc: &RequestDocument, base_url: &str) -> Result<RequestSpec, ParseError> {
    let base = if doc.base.is_empty() {
        base_url
    } else {
        doc.base.as_str()
    };
    let method = if doc.method.is_empty() {
        "GET".to_string()
    } else {
        doc.method.to_uppercase()
    };

    let is_json = doc
        .headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.contains("application/json"));

    let body = if is_json {
        if doc.body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&doc.body)
                .map_err(|e| ParseError::InvalidBody(format!("could not encode body: {e}")))?
        }
    } else {
        match &doc.body {
            Value::Null => Vec::new(),
            Value::String(s) => s.clone().into_bytes(),
            other => {
                return Err(ParseError::InvalidBody(format!(
                    "non-string body `{other}` requires a JSON Content-Type"
                )));
            }
        }
    };

    let mut request = RequestSpec::new(method, format!("{base}{}", doc.path)).with_body(body);
    for (name, value) in &doc.headers {
        request = request.with_header(name, value);
    }
    Ok(request)
}

/// Parse one `{type, data}` entry.
///
/// # Errors
///
/// Returns error for unknown types, missing or mistyped data, invalid
/// regexes and unregistered custom checks.
pub fn parse_check(doc: &CheckDocument, registry: &Registry) -> Result<Check, ParseError> {
    let data = CheckData(&doc.data);

    match doc.kind.as_str() {
        "bodyEqual" => Ok(Check::BodyEqual {
            value: data.required_string("value")?,
        }),

        "dataEqual" => Ok(Check::DataEqual {
            data_id: data.required_string("id")?,
            value: data.required("value")?,
        }),

        "jsonBodyEqual" => Ok(Check::JsonBodyEqual {
            value: data.required("value")?,
        }),

        "jsonBodyQueryExists" => Ok(Check::JsonQueryExists {
            query: data.required_string("query")?,
            data_id: data.optional_string("dataId"),
        }),

        "jsonBodyQueryEqual" => Ok(Check::JsonQueryEqual {
            query: data.required_string("query")?,
            value: data.required("value")?,
            data_id: data.optional_string("dataId"),
        }),

        "jsonBodyQueryRegexMatch" => {
            let query = data.required_string("query")?;
            let source = data.required_string("pattern")?;
            let pattern = Regex::new(&source).map_err(|e| ParseError::InvalidRegex {
                pattern: source.clone(),
                reason: e.to_string(),
            })?;

            let mut data_ids = data.data_ids()?;
            let whole_match = data.optional_string("dataId");
            if !whole_match.is_empty() {
                data_ids.insert(0, whole_match);
            }

            Ok(Check::JsonQueryRegexMatch {
                query,
                pattern,
                data_ids,
            })
        }

        "statusCodeEqual" => {
            let value = data.required_int("value")?;
            let value = u16::try_from(value).map_err(|_| ParseError::InvalidData {
                key: "value".into(),
                reason: format!("status code {value} out of range"),
            })?;
            Ok(Check::StatusCodeEqual { value })
        }

        "bodyCustom" => {
            let id = data.required_string("id")?;
            registry
                .custom_check(&id)
                .map(Check::BodyCustom)
                .ok_or(ParseError::UnknownCustomCheck(id))
        }

        other => Err(ParseError::UnknownCheckType(other.to_string())),
    }
}

/// Typed accessors over a check's data bag.
struct CheckData<'a>(&'a BTreeMap<String, Value>);

impl CheckData<'_> {
    fn required(&self, key: &str) -> Result<Value, ParseError> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| ParseError::MissingData(key.to_string()))
    }

    fn required_string(&self, key: &str) -> Result<String, ParseError> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ParseError::InvalidData {
                key: key.to_string(),
                reason: format!("expected a string, got `{other}`"),
            }),
            None => Err(ParseError::MissingData(key.to_string())),
        }
    }

    fn optional_string(&self, key: &str) -> String {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    fn required_int(&self, key: &str) -> Result<i64, ParseError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParseError::MissingData(key.to_string()))?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| ParseError::InvalidData {
                key: key.to_string(),
                reason: format!("expected a whole number, got `{value}`"),
            })
    }

    /// `dataIds`: capture group index (as a string key) → data id.
    fn data_ids(&self) -> Result<BTreeMap<usize, String>, ParseError> {
        let Some(raw) = self.0.get("dataIds") else {
            return Ok(BTreeMap::new());
        };
        let Some(map) = raw.as_object() else {
            return Err(ParseError::InvalidData {
                key: "dataIds".into(),
                reason: format!("expected an object, got `{raw}`"),
            });
        };
        collect_data_ids(map)
    }
}

fn collect_data_ids(map: &Map<String, Value>) -> Result<BTreeMap<usize, String>, ParseError> {
    let mut ids = BTreeMap::new();
    for (key, value) in map {
        let idx: usize = key.parse().map_err(|_| ParseError::InvalidData {
            key: "dataIds".into(),
            reason: format!("key `{key}` is not a capture group index"),
        })?;
        let Some(id) = value.as_str() else {
            return Err(ParseError::InvalidData {
                key: "dataIds".into(),
                reason: format!("value for `{idx}` is not a string"),
            });
        };
        ids.insert(idx, id.to_string());
    }
    Ok(ids)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("could not read test file: {0}")]
    Io(String),
    #[error("{0}")]
    Malformed(String),
    #[error("unhandled test version `{0}`")]
    UnsupportedVersion(i64),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("no request init hook registered with id `{0}`")]
    UnknownHook(String),
    #[error("could not parse check [{index}]: {reason}")]
    Check { index: usize, reason: String },
    #[error("unhandled check type `{0}`")]
    UnknownCheckType(String),
    #[error("missing required data `{0}`")]
    MissingData(String),
    #[error("invalid data `{key}`: {reason}")]
    InvalidData { key: String, reason: String },
    #[error("could not compile regex pattern `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("no custom body check registered with id `{0}`")]
    UnknownCustomCheck(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Test, ParseError> {
        let registry = Registry::with_builtin_hooks();
        let options = ParseOptions {
            base_url: "http://localhost:8080",
            registry: &registry,
        };
        parse_document(json, DocumentFormat::Json, &options)
    }

    #[test]
    fn defaults_applied() {
        let test = parse(r#"{"version": 1, "order": -3, "request": {"path": "/health"}}"#).unwrap();
        assert_eq!(test.name, "unknown");
        assert_eq!(test.group, "default");
        assert_eq!(test.order, 0);
        assert_eq!(test.request.method, "GET");
        assert_eq!(test.request.url, "http://localhost:8080/health");
        assert!(test.request.body.is_empty());
        assert!(test.response.is_none());
    }

    #[test]
    fn explicit_base_wins() {
        let test =
            parse(r#"{"version": 1, "request": {"base": "https://api.x.com", "path": "/a"}}"#)
                .unwrap();
        assert_eq!(test.request.url, "https://api.x.com/a");
    }

    #[test]
    fn unsupported_versions() {
        assert!(matches!(
            parse(r#"{"request": {}}"#),
            Err(ParseError::UnsupportedVersion(0))
        ));
        assert!(matches!(
            parse(r#"{"version": 2, "request": {}}"#),
            Err(ParseError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(parse("{"), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn json_body_encoded_for_json_content_type() {
        let test = parse(
            r#"{"version": 1, "request": {
                "method": "post", "path": "/users",
                "headers": {"Content-Type": "application/json; charset=utf-8"},
                "body": {"name": ":name:"}
            }}"#,
        )
        .unwrap();
        assert_eq!(test.request.method, "POST");
        assert_eq!(test.request.body, br#"{"name":":name:"}"#);
        assert_eq!(
            test.request.header("content-type"),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn string_body_used_verbatim() {
        let test =
            parse(r#"{"version": 1, "request": {"path": "/echo", "body": "hello"}}"#).unwrap();
        assert_eq!(test.request.body, b"hello");
    }

    #[test]
    fn object_body_without_json_content_type_rejected() {
        let err = parse(r#"{"version": 1, "request": {"body": {"a": 1}}}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidBody(_)));
    }

    #[test]
    fn every_check_type() {
        let mut registry = Registry::with_builtin_hooks();
        registry.register_custom_check("alwaysOk", |_: &[u8]| Ok(()));
        let options = ParseOptions {
            base_url: "http://localhost",
            registry: &registry,
        };
        let test = parse_document(
            r#"{"version": 1, "request": {"path": "/"}, "checks": [
                {"type": "bodyEqual", "data": {"value": "x"}},
                {"type": "jsonBodyEqual", "data": {"value": {"a": 1}}},
                {"type": "jsonBodyQueryExists", "data": {"query": "a"}},
                {"type": "jsonBodyQueryEqual", "data": {"query": "a", "value": null, "dataId": "a"}},
                {"type": "jsonBodyQueryRegexMatch", "data": {"query": "a", "pattern": "(\\d+)", "dataIds": {"1": "num"}}},
                {"type": "statusCodeEqual", "data": {"value": 201}},
                {"type": "dataEqual", "data": {"id": "a", "value": 1}},
                {"type": "bodyCustom", "data": {"id": "alwaysOk"}}
            ]}"#,
            DocumentFormat::Json,
            &options,
        )
        .unwrap();

        let kinds: Vec<&str> = test.checks.iter().map(Check::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "bodyEqual",
                "jsonBodyEqual",
                "jsonBodyQueryExists",
                "jsonBodyQueryEqual",
                "jsonBodyQueryRegexMatch",
                "statusCodeEqual",
                "dataEqual",
                "bodyCustom"
            ]
        );
        assert!(matches!(test.checks[5], Check::StatusCodeEqual { value: 201 }));
    }

    #[test]
    fn regex_data_id_binds_whole_match() {
        let test = parse(
            r#"{"version": 1, "request": {}, "checks": [
                {"type": "jsonBodyQueryRegexMatch", "data": {
                    "query": "link", "pattern": "/users/(\\d+)",
                    "dataId": "link", "dataIds": {"1": "user"}
                }}
            ]}"#,
        )
        .unwrap();
        let Check::JsonQueryRegexMatch { data_ids, .. } = &test.checks[0] else {
            panic!("expected regex check");
        };
        assert_eq!(data_ids.get(&0).map(String::as_str), Some("link"));
        assert_eq!(data_ids.get(&1).map(String::as_str), Some("user"));
    }

    #[test]
    fn definition_errors_name_the_check() {
        let err = parse(
            r#"{"version": 1, "request": {}, "checks": [
                {"type": "statusCodeEqual", "data": {"value": 200}},
                {"type": "nope", "data": {}}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not parse check [1]: unhandled check type `nope`"
        );
    }

    #[test]
    fn invalid_regex_rejected() {
        let err = parse(
            r#"{"version": 1, "request": {}, "checks": [
                {"type": "jsonBodyQueryRegexMatch", "data": {"query": "a", "pattern": "("}}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("could not compile regex pattern `(`"));
    }

    #[test]
    fn missing_data_rejected() {
        let err = parse(
            r#"{"version": 1, "request": {}, "checks": [{"type": "bodyEqual", "data": {}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("missing required data `value`"));
    }

    #[test]
    fn status_code_must_be_whole() {
        let test = parse(
            r#"{"version": 1, "request": {}, "checks": [
                {"type": "statusCodeEqual", "data": {"value": 204.0}}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(test.checks[0], Check::StatusCodeEqual { value: 204 }));

        let err = parse(
            r#"{"version": 1, "request": {}, "checks": [
                {"type": "statusCodeEqual", "data": {"value": 200.9}}
            ]}"#,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("expected a whole number, got `200.9`"),
            "{err}"
        );
    }

    #[test]
    fn unknown_registrations_rejected() {
        let err = parse(r#"{"version": 1, "request": {"init": {"signRequest": {}}}}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownHook(ref id) if id == "signRequest"));

        let err = parse(
            r#"{"version": 1, "request": {}, "checks": [{"type": "bodyCustom", "data": {"id": "x"}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no custom body check registered with id `x`"));
    }

    #[test]
    fn hooks_resolved_in_id_order() {
        let test = parse(
            r#"{"version": 1, "request": {"init": {
                "urlReplacements": {":a:": "1"},
                "headerReplacements": {":b:": "2"}
            }}}"#,
        )
        .unwrap();
        let ids: Vec<&str> = test.hooks.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["headerReplacements", "urlReplacements"]);
        assert_eq!(test.hooks[1].data.get(":a:"), Some(&Value::from("1")));
    }

    #[test]
    fn yaml_documents() {
        let registry = Registry::with_builtin_hooks();
        let options = ParseOptions {
            base_url: "http://localhost",
            registry: &registry,
        };
        let yaml = "
version: 1
name: health
group: smoke
request:
  path: /health
checks:
  - type: statusCodeEqual
    data:
      value: 200
";
        let test = parse_document(yaml, DocumentFormat::Yaml, &options).unwrap();
        assert_eq!(test.name, "health");
        assert_eq!(test.group, "smoke");
        assert!(matches!(test.checks[0], Check::StatusCodeEqual { value: 200 }));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
    }
}
