//! Domain patterns for conditional route groups.
//!
//! # Design Decisions
//! - `*` stands for exactly one host label
//! - Matching is case-sensitive and covers the whole host
//! - Patterns compile once, when the group is declared

use regex::Regex;

use crate::error::Error;

/// A compiled domain pattern such as `*.example.com`.
#[derive(Debug, Clone)]
pub struct DomainPattern {
    source: String,
    regex: Regex,
}

impl DomainPattern {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::InvalidPattern("domain pattern is empty".to_string()));
        }

        let mut labels = Vec::new();
        for label in pattern.split('.') {
            if label.is_empty() {
                return Err(Error::InvalidPattern(format!(
                    "domain pattern '{}' has an empty label",
                    pattern
                )));
            }
            if label == "*" {
                labels.push("[^.]+".to_string());
            } else {
                labels.push(regex::escape(label));
            }
        }

        let regex = Regex::new(&format!("^{}$", labels.join(r"\.")))
            .map_err(|e| Error::InvalidPattern(format!("domain pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, host: &str) -> bool {
        self.regex.is_match(host)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// One domain pattern or several, as accepted by `by_domain`.
#[derive(Debug, Clone)]
pub struct DomainList(Vec<String>);

impl DomainList {
    pub fn compile(&self) -> Result<Vec<DomainPattern>, Error> {
        if self.0.is_empty() {
            return Err(Error::InvalidPattern("domain list is empty".to_string()));
        }
        self.0.iter().map(|p| DomainPattern::new(p)).collect()
    }
}

impl From<&str> for DomainList {
    fn from(pattern: &str) -> Self {
        DomainList(vec![pattern.to_string()])
    }
}

impl From<String> for DomainList {
    fn from(pattern: String) -> Self {
        DomainList(vec![pattern])
    }
}

impl From<Vec<String>> for DomainList {
    fn from(patterns: Vec<String>) -> Self {
        DomainList(patterns)
    }
}

impl From<Vec<&str>> for DomainList {
    fn from(patterns: Vec<&str>) -> Self {
        DomainList(patterns.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for DomainList {
    fn from(patterns: &[String]) -> Self {
        DomainList(patterns.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for DomainList {
    fn from(patterns: [&str; N]) -> Self {
        DomainList(patterns.iter().map(|p| p.to_string()).collect())
    }
}
