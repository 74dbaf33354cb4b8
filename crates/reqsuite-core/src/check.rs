//! Response checks
//!
//! A closed set of validators. Each one inspects the buffered response and
//! may write extracted values into the [`DataContext`]. The first failing
//! check aborts the remaining checks of its test.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::context::{DataContext, DataError, value_to_text};
use crate::model::ResponseSnapshot;
use crate::query;

/// Signature of a caller-registered body check.
pub type BodyCheckFn = dyn Fn(&[u8]) -> Result<(), String> + Send + Sync;

/// A named custom body check resolved from the registry.
#[derive(Clone)]
pub struct CustomBodyCheck {
    pub id: String,
    func: Arc<BodyCheckFn>,
}

impl CustomBodyCheck {
    #[must_use]
    pub fn new(id: impl Into<String>, func: Arc<BodyCheckFn>) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

impl fmt::Debug for CustomBodyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBodyCheck")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Check {
    /// Body text equals `value` exactly
    BodyEqual { value: String },
    /// Body parses as JSON structurally equal to `value`
    JsonBodyEqual { value: Value },
    /// `query` exists in the JSON body
    JsonQueryExists { query: String, data_id: String },
    /// Value at `query` equals `value`
    JsonQueryEqual {
        query: String,
        value: Value,
        data_id: String,
    },
    /// Text at `query` matches `pattern`; capture groups bind to data ids
    JsonQueryRegexMatch {
        query: String,
        pattern: Regex,
        data_ids: BTreeMap<usize, String>,
    },
    StatusCodeEqual { value: u16 },
    /// Data context value at `data_id` equals `value` (absent = null)
    DataEqual { data_id: String, value: Value },
    BodyCustom(CustomBodyCheck),
}

impl Check {
    /// Document type name of this check.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BodyEqual { .. } => "bodyEqual",
            Self::JsonBodyEqual { .. } => "jsonBodyEqual",
            Self::JsonQueryExists { .. } => "jsonBodyQueryExists",
            Self::JsonQueryEqual { .. } => "jsonBodyQueryEqual",
            Self::JsonQueryRegexMatch { .. } => "jsonBodyQueryRegexMatch",
            Self::StatusCodeEqual { .. } => "statusCodeEqual",
            Self::DataEqual { .. } => "dataEqual",
            Self::BodyCustom(_) => "bodyCustom",
        }
    }

    /// Run the check against a response.
    ///
    /// # Errors
    ///
    /// Returns the reason the response was rejected, or a [`DataError`] if
    /// an extracted value could not be stored.
    pub fn check(&self, ctx: &DataContext, response: &ResponseSnapshot) -> Result<(), CheckError> {
        match self {
            Self::BodyEqual { value } => {
                let got = response.body_text();
                if *value != got {
                    return Err(CheckError::UnexpectedValue {
                        expected: value.clone(),
                        actual: got,
                    });
                }
                Ok(())
            }

            Self::JsonBodyEqual { value } => {
                let got: Value = serde_json::from_slice(&response.body)
                    .map_err(|e| CheckError::InvalidJsonBody(e.to_string()))?;
                if !json_equal(value, &got) {
                    return Err(CheckError::UnexpectedJsonBody {
                        expected: value.clone(),
                        actual: got,
                    });
                }
                Ok(())
            }

            Self::JsonQueryExists { query, data_id } => {
                let got = query_required(response, query)?;
                ctx.set_optional(data_id, got)?;
                Ok(())
            }

            Self::JsonQueryEqual {
                query,
                value,
                data_id,
            } => {
                let got = query_required(response, query)?;
                if !json_equal(value, &got) {
                    return Err(CheckError::UnexpectedQueryValue {
                        query: query.clone(),
                        expected: value.clone(),
                        actual: got,
                    });
                }
                ctx.set_optional(data_id, got)?;
                Ok(())
            }

            Self::JsonQueryRegexMatch {
                query,
                pattern,
                data_ids,
            } => {
                let text = value_to_text(&query_required(response, query)?);
                let Some(captures) = pattern.captures(&text) else {
                    return Err(CheckError::RegexMismatch {
                        query: query.clone(),
                        pattern: pattern.as_str().to_string(),
                        actual: text,
                    });
                };
                for (&idx, data_id) in data_ids {
                    if idx < captures.len() {
                        let group = captures.get(idx).map_or("", |m| m.as_str());
                        ctx.set_optional(data_id, Value::String(group.to_string()))?;
                    }
                }
                Ok(())
            }

            Self::StatusCodeEqual { value } => {
                if response.status_code != *value {
                    return Err(CheckError::UnexpectedStatus {
                        expected: *value,
                        actual: response.status_code,
                    });
                }
                Ok(())
            }

            Self::DataEqual { data_id, value } => {
                let got = ctx.get(data_id).unwrap_or(Value::Null);
                if !json_equal(value, &got) {
                    return Err(CheckError::UnexpectedData {
                        id: data_id.clone(),
                        expected: value.clone(),
                        actual: got,
                    });
                }
                Ok(())
            }

            Self::BodyCustom(custom) => {
                (custom.func)(response.body.as_slice()).map_err(|message| CheckError::Custom {
                    id: custom.id.clone(),
                    message,
                })
            }
        }
    }
}

fn query_required(response: &ResponseSnapshot, query: &str) -> Result<Value, CheckError> {
    query::query_bytes(&response.body, query).ok_or_else(|| CheckError::QueryMissing {
        query: query.to_string(),
    })
}

/// Structural JSON equality where `1` and `1.0` are the same number.
#[must_use]
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("unexpected value: expected {expected}, got {actual}")]
    UnexpectedValue { expected: String, actual: String },
    #[error("unexpected json body: expected {expected}, got {actual}")]
    UnexpectedJsonBody { expected: Value, actual: Value },
    #[error("could not parse response body as json: {0}")]
    InvalidJsonBody(String),
    #[error("json query element does not exist: {query}")]
    QueryMissing { query: String },
    #[error("unexpected value at {query}: expected {expected}, got {actual}")]
    UnexpectedQueryValue {
        query: String,
        expected: Value,
        actual: Value,
    },
    #[error("unexpected value at {query}: does not match pattern {pattern}: got {actual}")]
    RegexMismatch {
        query: String,
        pattern: String,
        actual: String,
    },
    #[error("expected status code `{expected}`, got `{actual}`")]
    UnexpectedStatus { expected: u16, actual: u16 },
    #[error("expected data item `{id}` to be `{expected}`, got `{actual}`")]
    UnexpectedData {
        id: String,
        expected: Value,
        actual: Value,
    },
    #[error("custom body check `{id}` failed: {message}")]
    Custom { id: String, message: String },
    #[error(transparent)]
    Data(#[from] DataError),
}
