//! Per-host route tables.
//!
//! # Responsibilities
//! - Work out which domain groups apply to a request host
//! - Build one frozen matcher per distinct set of applied groups
//! - Build a validation matcher that evaluates every domain group
//!
//! # Design Decisions
//! - The host only decides which `by_domain` groups run, so matchers are
//!   keyed by that group signature rather than by host name; any number of
//!   Host headers map onto a set bounded by the configuration
//! - The group layout comes from one `All`-scope build, which assumes the
//!   route source registers the same groups on every run
//! - Cache is bounded; signatures past the bound are built per request
//!   and dropped
//! - Matchers are immutable; the cache only ever inserts

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::domain::DomainPattern;
use super::matcher::RouteMatcher;
use super::table::{HostScope, RouteTable};
use crate::error::Error;

/// Bootstrap closure that registers tags, middleware and routes.
pub type RouteSource = Arc<dyn Fn(&mut RouteTable) -> Result<(), Error> + Send + Sync>;

/// Which declared domain groups match a host, in declaration order.
type GroupSignature = Vec<bool>;

/// Compiled route tables keyed by the domain groups a host selects.
pub struct HostRoutes {
    source: RouteSource,
    groups: OnceLock<Vec<Vec<DomainPattern>>>,
    cache: DashMap<GroupSignature, Arc<RouteMatcher>>,
    max_cached: usize,
}

impl HostRoutes {
    pub fn new(source: RouteSource, max_cached: usize) -> Self {
        Self {
            source,
            groups: OnceLock::new(),
            cache: DashMap::new(),
            max_cached,
        }
    }

    /// Build with every domain group applied. Surfaces every configuration
    /// error the source can raise.
    pub fn validate(&self) -> Result<RouteMatcher, Error> {
        let (matcher, groups) = self.build_all()?;
        let _ = self.groups.set(groups);
        Ok(matcher)
    }

    /// Matcher for `host`, shared with every host that selects the same
    /// domain groups.
    pub fn for_host(&self, host: &str) -> Result<Arc<RouteMatcher>, Error> {
        let signature = self.signature(host)?;
        if let Some(matcher) = self.cache.get(&signature) {
            return Ok(matcher.clone());
        }

        let matcher = Arc::new(self.build(HostScope::Host(host.to_string()))?);
        if self.cache.len() < self.max_cached {
            self.cache.insert(signature, matcher.clone());
            tracing::debug!(host, routes = matcher.len(), "Route table built");
        } else {
            tracing::warn!(host, max_cached = self.max_cached, "Route table cache full, not caching");
        }
        Ok(matcher)
    }

    /// Number of distinct route tables held.
    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }

    fn signature(&self, host: &str) -> Result<GroupSignature, Error> {
        Ok(self
            .groups()?
            .iter()
            .map(|patterns| patterns.iter().any(|p| p.matches(host)))
            .collect())
    }

    fn groups(&self) -> Result<&[Vec<DomainPattern>], Error> {
        if let Some(groups) = self.groups.get() {
            return Ok(groups);
        }
        let (_, groups) = self.build_all()?;
        Ok(self.groups.get_or_init(|| groups))
    }

    fn build_all(&self) -> Result<(RouteMatcher, Vec<Vec<DomainPattern>>), Error> {
        let mut table = RouteTable::new(HostScope::All);
        (self.source)(&mut table)?;
        let groups = table.take_domain_groups();
        Ok((table.into_matcher()?, groups))
    }

    fn build(&self, scope: HostScope) -> Result<RouteMatcher, Error> {
        let mut table = RouteTable::new(scope);
        (self.source)(&mut table)?;
        table.into_matcher()
    }
}

impl std::fmt::Debug for HostRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRoutes")
            .field("domain_groups", &self.groups.get().map(Vec::len))
            .field("cached_tables", &self.cache.len())
            .field("max_cached", &self.max_cached)
            .finish()
    }
}
