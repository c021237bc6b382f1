//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn validated configuration into registries, ACL rules and routes
//! - Build the dispatcher, surfacing every configuration error up front
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Routes stay a closure over the routing config so each host can
//!   rebuild its own table with the right domain groups
//! - Application registrations win over built-ins with the same name

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::acl::{AclEngine, AclGroup, Granules};
use crate::config::{AclConfig, DoorpadConfig, RoutingConfig};
use crate::dispatch::{register_builtin_handlers, Dispatcher, HandlerRegistry};
use crate::error::Error;
use crate::middleware::MiddlewareRegistry;
use crate::routing::{HostRoutes, RouteSource, RouteTable};
use crate::security::register_builtins;

/// Build the dispatcher for `config`.
///
/// `middleware` and `handlers` carry the application's own registrations;
/// built-ins are added for identifiers they leave free.
pub fn bootstrap(
    config: &DoorpadConfig,
    mut middleware: MiddlewareRegistry,
    mut handlers: HandlerRegistry,
) -> Result<Dispatcher, Error> {
    register_builtins(&mut middleware, &config.middleware)?;
    register_builtin_handlers(&mut handlers)?;

    let acl = build_acl(&config.acl)?;
    let routes = HostRoutes::new(route_source(&config.routing), config.server.max_cached_hosts);

    Dispatcher::new(routes, middleware, handlers, acl)
}

/// Route source replaying the routing section onto a table.
pub fn route_source(config: &RoutingConfig) -> RouteSource {
    let routing = config.clone();
    Arc::new(move |table: &mut RouteTable| apply_routing(table, &routing))
}

fn apply_routing(table: &mut RouteTable, routing: &RoutingConfig) -> Result<(), Error> {
    for (tag, fragment) in &routing.regex {
        table.add_regex(tag, fragment)?;
    }
    table.add_global_middleware(routing.global_middleware.clone())?;
    apply_routes(table, &routing.routes)?;

    for domain in &routing.domains {
        table.by_domain(domain.hosts.clone(), |t| {
            t.add_global_middleware(domain.global_middleware.clone())?;
            apply_routes(t, &domain.routes)
        })?;
    }
    Ok(())
}

fn apply_routes(table: &mut RouteTable, routes: &[toml::Value]) -> Result<(), Error> {
    for entry in routes {
        let mut options = entry.clone();
        let url = match options.as_table_mut().and_then(|t| t.remove("url")) {
            None => None,
            Some(toml::Value::String(url)) => Some(url),
            Some(other) => {
                return Err(Error::InvalidOptions(format!(
                    "'url' must be a string, got {}",
                    other.type_str()
                )))
            }
        };
        table.set_raw(url.as_deref(), &options)?;
    }
    Ok(())
}

/// Register every configured ACL rule, in order.
pub fn build_acl(config: &AclConfig) -> Result<AclEngine, Error> {
    let mut groups: BTreeMap<&str, AclGroup> = BTreeMap::new();
    for (name, entries) in &config.groups {
        let mut group = AclGroup::new();
        for entry in entries {
            group.push(entry.fields.clone(), entry.granules());
        }
        groups.insert(name.as_str(), group);
    }

    let mut engine = AclEngine::new();
    for rule in &config.rules {
        match (&rule.fields, &rule.group) {
            (Some(fields), None) => {
                engine.allow_fields(
                    &rule.controller,
                    &rule.action,
                    fields.clone(),
                    Granules::only(rule.granules.iter().cloned()),
                )?;
            }
            (None, Some(name)) => {
                let group = groups
                    .get(name.as_str())
                    .ok_or_else(|| Error::InvalidArgument(format!("unknown ACL group '{}'", name)))?;
                engine.allow_group(&rule.controller, &rule.action, group)?;
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "ACL rule for {}::{} needs exactly one of fields or group",
                    rule.controller, rule.action
                )))
            }
        }
    }

    tracing::debug!(rules = config.rules.len(), groups = groups.len(), "ACL rules registered");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{Authorization, CallerAttributes};
    use crate::config::parse_config;
    use crate::http::HttpMethod;

    const CONFIG: &str = r#"
        [routing]
        global_middleware = ["principal_headers"]
        regex = { "{num}" = "[0-9]+" }

        [[routing.routes]]
        url = "/visitors/{num}"
        controller = "Echo"
        action = "request"
        http_method = "get"

        [[routing.domains]]
        hosts = ["*.example.com"]
        global_middleware = ["security_headers"]

        [[routing.domains.routes]]
        url = "/"
        controller = "Health"
        action = "check"

        [acl.groups]
        staff = [
            { fields = { role = ["admin", "reception"] }, granules = ["view"] },
        ]

        [[acl.rules]]
        controller = "Echo"
        action = "request"
        group = "staff"

        [[acl.rules]]
        controller = "Echo"
        action = "request"
        fields = { role = "guest" }
    "#;

    #[test]
    fn test_bootstrap_from_config() {
        let config = parse_config(CONFIG).unwrap();
        let dispatcher = bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap();

        let m = dispatcher.resolve(HttpMethod::Get, "kiosk.example.com", "/visitors/7").unwrap();
        assert_eq!(m.slugs, ["7"]);
        assert!(dispatcher.resolve(HttpMethod::Get, "example.com", "/").is_err());
        assert!(dispatcher.resolve(HttpMethod::Get, "kiosk.example.com", "/").is_ok());

        let matcher = dispatcher.routes().for_host("kiosk.example.com").unwrap();
        assert_eq!(matcher.global_middleware(), ["principal_headers", "security_headers"]);
    }

    #[test]
    fn test_acl_rules_keep_order() {
        let config = parse_config(CONFIG).unwrap();
        let acl = build_acl(&config.acl).unwrap();

        let admin = CallerAttributes::new().with("role", "admin");
        assert_eq!(acl.is_allowed("Echo", "request", &admin), Authorization::from(&Granules::only(["view"])));
        let guest = CallerAttributes::new().with("role", "guest");
        assert_eq!(acl.is_allowed("Echo", "request", &guest), Authorization::AllowAll);
        assert_eq!(acl.rule_count("Echo", "request"), 2);
    }

    #[test]
    fn test_domain_errors_surface_at_bootstrap() {
        let config = parse_config(
            r#"
            [[routing.domains]]
            hosts = ["*.example.com"]

            [[routing.domains.routes]]
            url = "/"
            controller = "Missing"
            action = "handler"
            "#,
        )
        .unwrap();
        let err = bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownHandler(_)));
    }

    #[test]
    fn test_route_without_url() {
        let config = parse_config(
            r#"
            [[routing.routes]]
            controller = "Health"
            action = "check"
            "#,
        )
        .unwrap();
        let err = bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::MissingRoute));
    }

    #[test]
    fn test_non_string_url() {
        let config = parse_config(
            r#"
            [[routing.routes]]
            url = 3
            controller = "Health"
            action = "check"
            "#,
        )
        .unwrap();
        let err = bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }
}
