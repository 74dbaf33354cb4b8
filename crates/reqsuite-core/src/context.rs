//! Shared data context for values extracted by checks
//!
//! One context is shared by every test of a run. Checks write extracted
//! values into it; the request templater and `dataEqual` checks read them
//! back. The backing map is guarded by a lock so concurrently executing
//! tests can share it safely.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// Shared identifier → value store.
///
/// Cloning is cheap and yields a handle to the same store. A context created
/// with [`DataContext::detached`] has no store: reads return `None` and
/// writes fail with [`DataError::NoActiveContext`].
#[derive(Debug, Clone)]
pub struct DataContext {
    store: Option<Arc<RwLock<HashMap<String, Value>>>>,
}

impl DataContext {
    /// Create an active, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Some(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Create a context with no backing store.
    #[must_use]
    pub const fn detached() -> Self {
        Self { store: None }
    }

    /// Whether this handle is backed by a store.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.store.is_some()
    }

    /// Look up a value by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Value> {
        let store = self.store.as_ref()?;
        let map = store.read().unwrap_or_else(PoisonError::into_inner);
        map.get(id).cloned()
    }

    /// Store a value under `id`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NoActiveContext`] if the context is detached.
    pub fn set(&self, id: &str, value: Value) -> Result<(), DataError> {
        let Some(store) = self.store.as_ref() else {
            return Err(DataError::NoActiveContext(id.to_string()));
        };
        let mut map = store.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(id.to_string(), value);
        Ok(())
    }

    /// Like [`DataContext::set`], but a no-op when `id` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NoActiveContext`] if `id` is non-empty and the
    /// context is detached.
    pub fn set_optional(&self, id: &str, value: Value) -> Result<(), DataError> {
        if id.is_empty() {
            return Ok(());
        }
        self.set(id, value)
    }

    /// Look up a value and render it as replacement text.
    ///
    /// Absent identifiers render as the empty string.
    #[must_use]
    pub fn get_text(&self, id: &str) -> String {
        self.get(id).as_ref().map(value_to_text).unwrap_or_default()
    }

    /// Number of stored identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, |store| {
            store.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Whether no identifiers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the stored values, for reporting.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.store.as_ref().map_or_else(HashMap::new, |store| {
            store.read().unwrap_or_else(PoisonError::into_inner).clone()
        })
    }
}

impl Default for DataContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a JSON value as plain text.
///
/// Strings are used verbatim, `null` becomes the empty string and anything
/// else is rendered as compact JSON.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("could not store data id `{0}`: no active data context")]
    NoActiveContext(String),
}
