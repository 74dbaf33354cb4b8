//! Identifier registries for init hooks and custom body checks
//!
//! Test documents refer to hooks and custom checks by name. Names are
//! resolved here, once, while the document is parsed; execution only ever
//! sees the resolved values.

use std::collections::HashMap;
use std::sync::Arc;

use crate::check::{BodyCheckFn, CustomBodyCheck};
use crate::hook::{Replacements, RequestHook};

#[derive(Clone, Default)]
pub struct Registry {
    hooks: HashMap<String, Arc<dyn RequestHook>>,
    custom_checks: HashMap<String, Arc<BodyCheckFn>>,
}

impl Registry {
    /// An empty registry: no hooks, no custom checks.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in replacement hooks.
    #[must_use]
    pub fn with_builtin_hooks() -> Self {
        let mut registry = Self::empty();
        for hook in Replacements::ALL {
            registry.register_hook(hook.id(), hook);
        }
        registry
    }

    /// Register (or replace) a request-init hook.
    pub fn register_hook(&mut self, id: impl Into<String>, hook: impl RequestHook + 'static) {
        self.hooks.insert(id.into(), Arc::new(hook));
    }

    /// Register (or replace) a custom body check.
    pub fn register_custom_check<F>(&mut self, id: impl Into<String>, check: F)
    where
        F: Fn(&[u8]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom_checks.insert(id.into(), Arc::new(check));
    }

    #[must_use]
    pub fn hook(&self, id: &str) -> Option<Arc<dyn RequestHook>> {
        self.hooks.get(id).cloned()
    }

    #[must_use]
    pub fn custom_check(&self, id: &str) -> Option<CustomBodyCheck> {
        self.custom_checks
            .get(id)
            .map(|func| CustomBodyCheck::new(id, Arc::clone(func)))
    }

    /// Registered hook identifiers, sorted.
    #[must_use]
    pub fn hook_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut checks: Vec<&str> = self.custom_checks.keys().map(String::as_str).collect();
        checks.sort_unstable();
        f.debug_struct("Registry")
            .field("hooks", &self.hook_ids())
            .field("custom_checks", &checks)
            .finish()
    }
}
