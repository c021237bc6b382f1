//! Reusable placeholder tags for route patterns.

use indexmap::IndexMap;
use regex::Regex;

use crate::error::Error;

/// Maps a literal tag (e.g. `{num}`) to a regex fragment.
#[derive(Debug, Clone, Default)]
pub struct RegexTagRegistry {
    tags: IndexMap<String, String>,
}

impl RegexTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `{num}`, `{alpha}`, `{alphanum}` and `{slug}`.
    pub fn with_defaults() -> Self {
        let mut tags = IndexMap::new();
        for (tag, fragment) in [
            ("{num}", "[0-9]+"),
            ("{alpha}", "[a-zA-Z]+"),
            ("{alphanum}", "[a-zA-Z0-9]+"),
            ("{slug}", "[a-zA-Z0-9_-]+"),
        ] {
            tags.insert(tag.to_string(), fragment.to_string());
        }
        Self { tags }
    }

    /// Register or replace a tag. Both parts must be non-empty and the
    /// fragment must compile on its own.
    pub fn add(&mut self, tag: &str, fragment: &str) -> Result<(), Error> {
        if tag.is_empty() {
            return Err(Error::InvalidPattern("regex tag is empty".to_string()));
        }
        if fragment.is_empty() {
            return Err(Error::InvalidPattern(format!("regex for tag '{}' is empty", tag)));
        }
        Regex::new(&format!("^(?:{})$", fragment))
            .map_err(|e| Error::InvalidPattern(format!("regex for tag '{}': {}", tag, e)))?;

        self.tags.insert(tag.to_string(), fragment.to_string());
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags ordered longest first, so `{number}` is tried before `{num}`.
    pub fn by_length(&self) -> Vec<(&str, &str)> {
        let mut tags: Vec<(&str, &str)> = self
            .tags
            .iter()
            .map(|(t, f)| (t.as_str(), f.as_str()))
            .collect();
        tags.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        tags
    }
}
