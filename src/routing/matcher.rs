//! Route matching logic.
//!
//! # Responsibilities
//! - Compile route patterns into anchored regexes
//! - Scan routes for a method in registration order; first full match wins
//! - Extract slugs in capture order
//! - Fall back to the method-independent 404 route
//!
//! # Design Decisions
//! - Tags substitute longest first; unknown `{...}` text stays literal
//! - Matching is case-sensitive over the normalised path
//! - Linear scan on purpose: overlapping patterns resolve by declaration order
//! - Immutable once compiled (shared without locks)

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use super::table::{normalize_path, RouteDefinition};
use super::tags::RegexTagRegistry;
use crate::error::Error;
use crate::http::HttpMethod;

/// A route pattern compiled to a regex.
#[derive(Debug)]
pub struct CompiledRoute {
    definition: Arc<RouteDefinition>,
    regex: Regex,
    captures: usize,
}

impl CompiledRoute {
    pub fn definition(&self) -> &Arc<RouteDefinition> {
        &self.definition
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Captured slugs followed by the route's hard-coded slugs, or `None`
    /// if `path` does not match.
    fn capture(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        let mut slugs: Vec<String> = (0..self.captures)
            .map(|i| {
                caps.name(&slug_group(i))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();
        slugs.extend(self.definition.slugs().iter().cloned());
        Some(slugs)
    }
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteDefinition>,
    pub slugs: Vec<String>,
    /// True when the 404 route answered.
    pub fallback: bool,
}

/// Frozen route set for one host.
#[derive(Debug)]
pub struct RouteMatcher {
    host: Option<String>,
    routes: HashMap<HttpMethod, Vec<CompiledRoute>>,
    global_middleware: Vec<String>,
    not_found: Option<Arc<RouteDefinition>>,
    server_error: Option<Arc<RouteDefinition>>,
}

impl RouteMatcher {
    pub(crate) fn compile(
        host: Option<String>,
        tags: &RegexTagRegistry,
        definitions: HashMap<HttpMethod, Vec<RouteDefinition>>,
        global_middleware: Vec<String>,
        not_found: Option<RouteDefinition>,
        server_error: Option<RouteDefinition>,
    ) -> Result<Self, Error> {
        let ordered_tags = tags.by_length();
        let mut routes = HashMap::new();

        for (method, defs) in definitions {
            let mut compiled = Vec::with_capacity(defs.len());
            for def in defs {
                let (regex, captures) = compile_pattern(def.pattern(), &ordered_tags)?;
                tracing::debug!(
                    method = %method,
                    pattern = %def.pattern(),
                    regex = %regex.as_str(),
                    "Route compiled"
                );
                compiled.push(CompiledRoute {
                    definition: Arc::new(def),
                    regex,
                    captures,
                });
            }
            routes.insert(method, compiled);
        }

        Ok(Self {
            host,
            routes,
            global_middleware,
            not_found: not_found.map(Arc::new),
            server_error: server_error.map(Arc::new),
        })
    }

    /// First host this matcher was built for. Hosts selecting the same
    /// domain groups share it. `None` for the validation build.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn global_middleware(&self) -> &[String] {
        &self.global_middleware
    }

    pub fn not_found_route(&self) -> Option<&Arc<RouteDefinition>> {
        self.not_found.as_ref()
    }

    pub fn server_error_route(&self) -> Option<&Arc<RouteDefinition>> {
        self.server_error.as_ref()
    }

    /// Compiled routes for `method` in registration order.
    pub fn routes(&self, method: HttpMethod) -> &[CompiledRoute] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of (pattern, method) entries.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the route for `method` and `path`.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Result<RouteMatch, Error> {
        let normalized = normalize_path(path);

        for route in self.routes(method) {
            if let Some(slugs) = route.capture(&normalized) {
                tracing::debug!(
                    method = %method,
                    path = %normalized,
                    pattern = %route.definition.pattern(),
                    slugs = ?slugs,
                    "Route matched"
                );
                return Ok(RouteMatch {
                    route: route.definition.clone(),
                    slugs,
                    fallback: false,
                });
            }
        }

        match &self.not_found {
            Some(route) => {
                tracing::debug!(method = %method, path = %normalized, "No route matched, using 404 route");
                Ok(RouteMatch {
                    route: route.clone(),
                    slugs: route.slugs().to_vec(),
                    fallback: true,
                })
            }
            None => Err(Error::RouteNotFound {
                method,
                path: normalized,
            }),
        }
    }
}

fn slug_group(index: usize) -> String {
    format!("__slug{}", index)
}

/// Turn a normalised pattern into an anchored regex.
///
/// `tags` must be ordered longest first. Returns the regex and the number of
/// slug groups it captures.
pub fn compile_pattern(pattern: &str, tags: &[(&str, &str)]) -> Result<(Regex, usize), Error> {
    let mut source = String::from("^");
    let mut captures = 0;
    let mut rest = pattern;

    'scan: while let Some(ch) = rest.chars().next() {
        for (tag, fragment) in tags {
            if rest.starts_with(tag) {
                source.push_str(&format!("(?P<{}>{})", slug_group(captures), fragment));
                captures += 1;
                rest = &rest[tag.len()..];
                continue 'scan;
            }
        }
        source.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])));
        rest = &rest[ch.len_utf8()..];
    }
    source.push('$');

    let regex = Regex::new(&source)
        .map_err(|e| Error::InvalidPattern(format!("route '{}': {}", pattern, e)))?;
    Ok((regex, captures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::table::{RouteOptions, RouteTable};

    fn matcher(build: impl FnOnce(&mut RouteTable)) -> RouteMatcher {
        let mut table = RouteTable::for_host("localhost");
        build(&mut table);
        table.into_matcher().unwrap()
    }

    #[test]
    fn test_tag_substitution_and_slugs() {
        let m = matcher(|t| {
            t.add_regex("{num}", "[0-9]+").unwrap();
            t.set("/item/{num}/", RouteOptions::to("Items", "show")).unwrap();
        });

        let hit = m.resolve(HttpMethod::Get, "/item/42/").unwrap();
        assert_eq!(hit.slugs, vec!["42".to_string()]);
        assert!(!hit.fallback);
        assert!(matches!(
            m.resolve(HttpMethod::Get, "/item/abc/"),
            Err(Error::RouteNotFound { .. })
        ));
    }

    #[test]
    fn test_request_path_is_normalised() {
        let m = matcher(|t| {
            t.set("/visitors/{num}", RouteOptions::to("Visitors", "show")).unwrap();
        });
        assert_eq!(m.resolve(HttpMethod::Get, "visitors/7").unwrap().slugs, ["7"]);
    }

    #[test]
    fn test_first_registered_wins() {
        let m = matcher(|t| {
            t.set("/visitors/{alpha}/", RouteOptions::to("Visitors", "byName")).unwrap();
            t.set("/visitors/{alphanum}/", RouteOptions::to("Visitors", "byCode")).unwrap();
        });
        let hit = m.resolve(HttpMethod::Get, "/visitors/smith/").unwrap();
        assert_eq!(hit.route.handler().action(), Some("byName"));
        let hit = m.resolve(HttpMethod::Get, "/visitors/x9/").unwrap();
        assert_eq!(hit.route.handler().action(), Some("byCode"));
    }

    #[test]
    fn test_method_independence() {
        let m = matcher(|t| {
            t.set("/a/", RouteOptions::to("A", "index").method(HttpMethod::Get)).unwrap();
        });
        assert!(m.resolve(HttpMethod::Get, "/a/").is_ok());
        assert!(matches!(
            m.resolve(HttpMethod::Post, "/a/"),
            Err(Error::RouteNotFound { method: HttpMethod::Post, .. })
        ));
    }

    #[test]
    fn test_not_found_fallback_is_method_independent() {
        let m = matcher(|t| {
            t.set("/a/", RouteOptions::to("A", "index").method(HttpMethod::Get)).unwrap();
            t.set("/404/", RouteOptions::to("Errors", "not_found").method(HttpMethod::Get).not_found())
                .unwrap();
        });
        let hit = m.resolve(HttpMethod::Delete, "/nowhere/").unwrap();
        assert!(hit.fallback);
        assert_eq!(hit.route.pattern(), "/404/");
    }

    #[test]
    fn test_unknown_placeholder_is_literal() {
        let m = matcher(|t| {
            t.set("/docs/{page}/", RouteOptions::to("Docs", "show")).unwrap();
        });
        assert!(m.resolve(HttpMethod::Get, "/docs/{page}/").is_ok());
        assert!(m.resolve(HttpMethod::Get, "/docs/intro/").is_err());
    }

    #[test]
    fn test_longest_tag_first() {
        let m = matcher(|t| {
            t.add_regex(":id", "[0-9]+").unwrap();
            t.add_regex(":idx", "[a-z]+").unwrap();
            t.set("/code/:idx/", RouteOptions::to("Codes", "show")).unwrap();
        });
        assert_eq!(m.resolve(HttpMethod::Get, "/code/abc/").unwrap().slugs, ["abc"]);
        assert!(m.resolve(HttpMethod::Get, "/code/12x/").is_err());
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let m = matcher(|t| {
            t.set("/export.csv/", RouteOptions::to("Reports", "csv")).unwrap();
        });
        assert!(m.resolve(HttpMethod::Get, "/export.csv/").is_ok());
        assert!(m.resolve(HttpMethod::Get, "/exportxcsv/").is_err());
    }

    #[test]
    fn test_hard_coded_slugs_follow_captures() {
        let m = matcher(|t| {
            t.set(
                "/visitors/{num}/out/",
                RouteOptions::to("Visitors", "status").slug("signed_out"),
            )
            .unwrap();
        });
        let hit = m.resolve(HttpMethod::Get, "/visitors/3/out/").unwrap();
        assert_eq!(hit.slugs, ["3", "signed_out"]);
    }

    #[test]
    fn test_fragment_groups_do_not_shift_slugs() {
        let m = matcher(|t| {
            t.add_regex("{date}", "([0-9]{4})-([0-9]{2})").unwrap();
            t.set("/report/{date}/{num}/", RouteOptions::to("Reports", "day")).unwrap();
        });
        let hit = m.resolve(HttpMethod::Get, "/report/2024-05/9/").unwrap();
        assert_eq!(hit.slugs, ["2024-05", "9"]);
    }
}
