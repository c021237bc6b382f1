//! Reusable rule groups.

use super::engine::AclEngine;
use super::rule::{FieldMatchSet, Granules};
use crate::error::Error;

/// An ordered collection of `(fields, granules)` pairs that can be assigned
/// to many targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclGroup {
    entries: Vec<(FieldMatchSet, Granules)>,
}

impl AclGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, fields: FieldMatchSet, granules: impl Into<Granules>) -> Self {
        self.push(fields, granules);
        self
    }

    pub fn push(&mut self, fields: FieldMatchSet, granules: impl Into<Granules>) {
        self.entries.push((fields, granules.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(FieldMatchSet, Granules)] {
        &self.entries
    }
}

/// Fluent builder returned by [`AclEngine::create_group`].
#[must_use = "a group does nothing until assigned"]
pub struct GroupBuilder<'a> {
    engine: &'a mut AclEngine,
    group: AclGroup,
}

impl<'a> GroupBuilder<'a> {
    pub(super) fn new(engine: &'a mut AclEngine) -> Self {
        Self {
            engine,
            group: AclGroup::new(),
        }
    }

    pub fn add(mut self, fields: FieldMatchSet, granules: impl Into<Granules>) -> Self {
        self.group.push(fields, granules);
        self
    }

    /// Register every entry for `controller`/`action`, returning the group
    /// so it can be assigned again elsewhere.
    pub fn assign(self, controller: &str, action: &str) -> Result<AclGroup, Error> {
        self.engine.allow_group(controller, action, &self.group)?;
        Ok(self.group)
    }

    /// Detach the group without assigning it.
    pub fn into_group(self) -> AclGroup {
        self.group
    }
}
