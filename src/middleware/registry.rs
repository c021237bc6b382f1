//! Middleware lookup by identifier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Middleware;
use crate::error::Error;

/// Identifier → middleware instance. Filled at bootstrap, read-only after.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `middleware` under `id`, replacing any previous entry.
    pub fn register(&mut self, id: &str, middleware: impl Middleware + 'static) -> Result<(), Error> {
        self.register_arc(id, Arc::new(middleware))
    }

    pub fn register_arc(&mut self, id: &str, middleware: Arc<dyn Middleware>) -> Result<(), Error> {
        if id.trim().is_empty() {
            return Err(Error::InvalidListener("middleware identifier is empty".to_string()));
        }
        if self.entries.insert(id.to_string(), middleware).is_some() {
            tracing::debug!(middleware = id, "Middleware replaced");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Resolve `id` or fail with `InvalidListener`.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.get(id)
            .ok_or_else(|| Error::InvalidListener(format!("middleware '{}' is not registered", id)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("MiddlewareRegistry").field("ids", &ids).finish()
    }
}
