//! Route registration.
//!
//! # Responsibilities
//! - Normalise URL patterns to a single leading and trailing slash
//! - Store one definition per (pattern, method); re-registering replaces
//!   the definition in place
//! - Collect global middleware in registration order
//! - Track the method-independent 404 and 500 routes
//! - Evaluate domain groups against the host the table is built for
//!
//! # Design Decisions
//! - Building is mutable; [`RouteTable::into_matcher`] freezes it
//! - Tags may be added after the routes that use them; patterns compile at
//!   freeze time

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use super::domain::{DomainList, DomainPattern};
use super::matcher::RouteMatcher;
use super::tags::RegexTagRegistry;
use crate::dispatch::Handler;
use crate::error::Error;
use crate::http::{HttpMethod, MatchedRoute};
use crate::middleware::MiddlewareIds;

/// What a route invokes.
#[derive(Clone)]
pub enum HandlerRef {
    /// A controller/action pair resolved through the handler registry.
    Target { controller: String, action: String },
    /// A handler supplied directly at registration.
    Inline(Arc<dyn Handler>),
}

impl HandlerRef {
    pub fn target(controller: impl Into<String>, action: impl Into<String>) -> Self {
        HandlerRef::Target {
            controller: controller.into(),
            action: action.into(),
        }
    }

    pub fn controller(&self) -> Option<&str> {
        match self {
            HandlerRef::Target { controller, .. } => Some(controller),
            HandlerRef::Inline(_) => None,
        }
    }

    pub fn action(&self) -> Option<&str> {
        match self {
            HandlerRef::Target { action, .. } => Some(action),
            HandlerRef::Inline(_) => None,
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Target { controller, action } => write!(f, "{}@{}", controller, action),
            HandlerRef::Inline(_) => f.write_str("<inline>"),
        }
    }
}

/// Extra authorization a route requires before its handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclRequirement {
    /// Any non-denied ACL result.
    Any,
    /// The named granule must be granted.
    Granule(String),
}

/// Options accepted by [`RouteTable::set`].
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Empty means every method.
    pub methods: Vec<HttpMethod>,
    pub handler: HandlerRef,
    pub model: Option<String>,
    /// Hard-coded slugs appended after captured ones.
    pub slugs: Vec<String>,
    pub middleware: Vec<String>,
    /// False when the route opts out of global middleware.
    pub global_middleware: bool,
    pub not_found: bool,
    pub server_error: bool,
    pub acl: Option<AclRequirement>,
}

impl RouteOptions {
    pub fn new(handler: HandlerRef) -> Self {
        Self {
            methods: Vec::new(),
            handler,
            model: None,
            slugs: Vec::new(),
            middleware: Vec::new(),
            global_middleware: true,
            not_found: false,
            server_error: false,
            acl: None,
        }
    }

    /// Route to a controller/action pair.
    pub fn to(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(HandlerRef::target(controller, action))
    }

    /// Route to an inline handler.
    pub fn inline(handler: impl Handler + 'static) -> Self {
        Self::new(HandlerRef::Inline(Arc::new(handler)))
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.methods.extend(methods);
        self
    }

    pub fn middleware(mut self, ids: impl Into<MiddlewareIds>) -> Self {
        self.middleware.extend(ids.into().flatten());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slugs.push(slug.into());
        self
    }

    pub fn without_global_middleware(mut self) -> Self {
        self.global_middleware = false;
        self
    }

    pub fn not_found(mut self) -> Self {
        self.not_found = true;
        self
    }

    pub fn server_error(mut self) -> Self {
        self.server_error = true;
        self
    }

    pub fn acl(mut self, requirement: AclRequirement) -> Self {
        self.acl = Some(requirement);
        self
    }

    /// Parse options from a configuration value.
    ///
    /// The value must be a table. `http_method`, `middleware` and `slugs`
    /// accept a single string or a list; `404`/`500` mark fallback routes;
    /// `acl` is `true` or a granule name.
    pub fn from_value(value: &toml::Value) -> Result<Self, Error> {
        if !value.is_table() {
            return Err(Error::InvalidOptions(format!(
                "expected a table, found {}",
                value.type_str()
            )));
        }
        let raw: RawRouteOptions = value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| Error::InvalidOptions(e.to_string()))?;
        raw.into_options()
    }
}

/// Single value or list, normalised to a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAcl {
    Flag(bool),
    Granule(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRouteOptions {
    #[serde(default)]
    http_method: OneOrMany<String>,
    model: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    #[serde(default)]
    slugs: OneOrMany<String>,
    #[serde(default)]
    middleware: OneOrMany<String>,
    #[serde(default = "default_true")]
    global_middleware: bool,
    #[serde(rename = "404", default)]
    not_found: bool,
    #[serde(rename = "500", default)]
    server_error: bool,
    acl: Option<RawAcl>,
}

fn default_true() -> bool {
    true
}

impl RawRouteOptions {
    fn into_options(self) -> Result<RouteOptions, Error> {
        let controller = self
            .controller
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::InvalidOptions("'controller' is required".to_string()))?;
        let action = self
            .action
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Error::InvalidOptions("'action' is required".to_string()))?;

        let methods = self
            .http_method
            .into_vec()
            .iter()
            .map(|m| HttpMethod::parse(m).ok_or_else(|| Error::InvalidOptions(format!("unknown http_method '{}'", m))))
            .collect::<Result<Vec<_>, _>>()?;

        let acl = match self.acl {
            None | Some(RawAcl::Flag(false)) => None,
            Some(RawAcl::Flag(true)) => Some(AclRequirement::Any),
            Some(RawAcl::Granule(g)) if g.trim().is_empty() => {
                return Err(Error::InvalidOptions("'acl' granule is empty".to_string()))
            }
            Some(RawAcl::Granule(g)) => Some(AclRequirement::Granule(g)),
        };

        Ok(RouteOptions {
            methods,
            handler: HandlerRef::Target { controller, action },
            model: self.model,
            slugs: self.slugs.into_vec(),
            middleware: self.middleware.into_vec(),
            global_middleware: self.global_middleware,
            not_found: self.not_found,
            server_error: self.server_error,
            acl,
        })
    }
}

/// A registered route for one method.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pattern: String,
    method: HttpMethod,
    handler: HandlerRef,
    model: Option<String>,
    slugs: Vec<String>,
    middleware: Vec<String>,
    global_middleware: bool,
    not_found: bool,
    server_error: bool,
    acl: Option<AclRequirement>,
}

impl RouteDefinition {
    fn from_options(pattern: &str, method: HttpMethod, options: &RouteOptions) -> Self {
        Self {
            pattern: pattern.to_string(),
            method,
            handler: options.handler.clone(),
            model: options.model.clone(),
            slugs: options.slugs.clone(),
            middleware: options.middleware.clone(),
            global_middleware: options.global_middleware,
            not_found: options.not_found,
            server_error: options.server_error,
            acl: options.acl.clone(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    pub fn uses_global_middleware(&self) -> bool {
        self.global_middleware
    }

    pub fn is_not_found(&self) -> bool {
        self.not_found
    }

    pub fn is_server_error(&self) -> bool {
        self.server_error
    }

    pub fn acl(&self) -> Option<&AclRequirement> {
        self.acl.as_ref()
    }

    /// Request-facing summary of this route.
    pub fn matched(&self, fallback: bool) -> MatchedRoute {
        MatchedRoute {
            pattern: self.pattern.clone(),
            controller: self.handler.controller().map(str::to_string),
            action: self.handler.action().map(str::to_string),
            model: self.model.clone(),
            fallback,
        }
    }
}

/// Which domain groups a table build evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostScope {
    /// Only groups whose patterns match this host.
    Host(String),
    /// Every group, used to validate configuration at bootstrap.
    All,
}

/// Mutable route registry for one host.
#[derive(Debug)]
pub struct RouteTable {
    scope: HostScope,
    tags: RegexTagRegistry,
    routes: HashMap<HttpMethod, IndexMap<String, RouteDefinition>>,
    global_middleware: Vec<String>,
    not_found: Option<RouteDefinition>,
    server_error: Option<RouteDefinition>,
    /// Every group declared, in call order. Filled in `All` scope only.
    domain_groups: Vec<Vec<DomainPattern>>,
}

impl RouteTable {
    pub fn new(scope: HostScope) -> Self {
        Self {
            scope,
            tags: RegexTagRegistry::with_defaults(),
            routes: HashMap::new(),
            global_middleware: Vec::new(),
            not_found: None,
            server_error: None,
            domain_groups: Vec::new(),
        }
    }

    /// Table built for requests to `host`.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self::new(HostScope::Host(host.into()))
    }

    pub fn scope(&self) -> &HostScope {
        &self.scope
    }

    pub fn tags(&self) -> &RegexTagRegistry {
        &self.tags
    }

    pub fn add_regex(&mut self, tag: &str, fragment: &str) -> Result<(), Error> {
        self.tags.add(tag, fragment)
    }

    /// Register `url` for every method in `options` (all methods if none).
    pub fn set(&mut self, url: &str, options: RouteOptions) -> Result<(), Error> {
        if url.trim().is_empty() {
            return Err(Error::MissingRoute);
        }
        if options.acl.is_some() && matches!(options.handler, HandlerRef::Inline(_)) {
            return Err(Error::InvalidOptions(
                "ACL-gated routes need a controller and action".to_string(),
            ));
        }
        if let Some(id) = options.middleware.iter().find(|id| id.trim().is_empty()) {
            return Err(Error::InvalidListener(format!("empty middleware identifier '{}'", id)));
        }

        let pattern = normalize_path(url);
        let methods: Vec<HttpMethod> = if options.methods.is_empty() {
            HttpMethod::ALL.to_vec()
        } else {
            let mut unique = Vec::new();
            for m in &options.methods {
                if !unique.contains(m) {
                    unique.push(*m);
                }
            }
            unique
        };

        for method in &methods {
            let definition = RouteDefinition::from_options(&pattern, *method, &options);
            tracing::debug!(pattern = %pattern, method = %method, handler = ?options.handler, "Route registered");
            self.routes
                .entry(*method)
                .or_default()
                .insert(pattern.clone(), definition);
        }

        if let Some(first) = methods.first() {
            if options.not_found {
                self.not_found = Some(RouteDefinition::from_options(&pattern, *first, &options));
            }
            if options.server_error {
                self.server_error = Some(RouteDefinition::from_options(&pattern, *first, &options));
            }
        }
        Ok(())
    }

    /// Register from loosely-typed options (see [`RouteOptions::from_value`]).
    pub fn set_raw(&mut self, url: Option<&str>, options: &toml::Value) -> Result<(), Error> {
        let url = url.filter(|u| !u.trim().is_empty()).ok_or(Error::MissingRoute)?;
        let options = RouteOptions::from_value(options)?;
        self.set(url, options)
    }

    /// Append to the global middleware list. Nested lists are flattened.
    pub fn add_global_middleware(&mut self, ids: impl Into<MiddlewareIds>) -> Result<(), Error> {
        let ids = ids.into().flatten();
        if let Some(id) = ids.iter().find(|id| id.trim().is_empty()) {
            return Err(Error::InvalidListener(format!("empty middleware identifier '{}'", id)));
        }
        self.global_middleware.extend(ids);
        Ok(())
    }

    /// Run `register` now if the table's host matches any of `domains`.
    /// Returns whether it ran.
    pub fn by_domain<F>(&mut self, domains: impl Into<DomainList>, register: F) -> Result<bool, Error>
    where
        F: FnOnce(&mut RouteTable) -> Result<(), Error>,
    {
        let patterns = domains.into().compile()?;
        let applies = match &self.scope {
            HostScope::All => {
                self.domain_groups.push(patterns.clone());
                true
            }
            HostScope::Host(host) => patterns.iter().any(|p| p.matches(host)),
        };

        if applies {
            tracing::debug!(
                domains = ?patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
                scope = ?self.scope,
                "Domain group applied"
            );
            register(self)?;
        }
        Ok(applies)
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.global_middleware
    }

    /// Routes for `method` in registration order.
    pub fn routes(&self, method: HttpMethod) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.get(&method).into_iter().flat_map(|m| m.values())
    }

    pub fn not_found_route(&self) -> Option<&RouteDefinition> {
        self.not_found.as_ref()
    }

    pub fn server_error_route(&self) -> Option<&RouteDefinition> {
        self.server_error.as_ref()
    }

    /// Domain groups seen by an `All`-scope build, in declaration order.
    pub fn take_domain_groups(&mut self) -> Vec<Vec<DomainPattern>> {
        std::mem::take(&mut self.domain_groups)
    }

    /// Compile every pattern and freeze the table.
    pub fn into_matcher(self) -> Result<RouteMatcher, Error> {
        let host = match self.scope {
            HostScope::Host(host) => Some(host),
            HostScope::All => None,
        };
        let mut routes = HashMap::new();
        for (method, definitions) in self.routes {
            routes.insert(method, definitions.into_values().collect::<Vec<_>>());
        }
        RouteMatcher::compile(
            host,
            &self.tags,
            routes,
            self.global_middleware,
            self.not_found,
            self.server_error,
        )
    }
}

/// Trim surrounding slashes and whitespace, then wrap in exactly one
/// leading and one trailing slash. The root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
