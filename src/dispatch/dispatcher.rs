//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the route for the request's host, method and path
//! - Run global then route middleware, stopping on deny or redirect
//! - Gate ACL-protected routes on the caller's attributes
//! - Invoke the handler, falling back to the 500 route on failure or panic
//!
//! # Design Decisions
//! - Every collaborator is built before the dispatcher and is read-only
//!   afterwards; per-request state lives on the request and response
//! - Construction checks every handler and middleware reference, so a
//!   dispatcher that exists cannot fail on configuration at request time
//! - Routing is synchronous; the server adapter owns timeouts

use std::time::Instant;

use axum::http::StatusCode;

use super::handler::{call_guarded, HandlerRegistry};
use crate::acl::AclEngine;
use crate::error::{Error, HandlerError};
use crate::http::{HttpMethod, Request, Response, ResponseState};
use crate::middleware::{MiddlewareChain, MiddlewareRegistry};
use crate::observability::metrics;
use crate::routing::{AclRequirement, HandlerRef, HostRoutes, RouteDefinition, RouteMatch, RouteMatcher};

/// The request pipeline.
#[derive(Debug)]
pub struct Dispatcher {
    routes: HostRoutes,
    middleware: MiddlewareRegistry,
    handlers: HandlerRegistry,
    acl: AclEngine,
}

impl Dispatcher {
    /// Assemble the pipeline, rejecting dangling references.
    ///
    /// Routes are built in validation mode, with every domain group applied,
    /// and each route's handler and middleware must resolve.
    pub fn new(
        routes: HostRoutes,
        middleware: MiddlewareRegistry,
        handlers: HandlerRegistry,
        acl: AclEngine,
    ) -> Result<Self, Error> {
        let matcher = routes.validate()?;

        for id in matcher.global_middleware() {
            middleware.resolve(id)?;
        }

        let definitions = HttpMethod::ALL
            .iter()
            .flat_map(|m| matcher.routes(*m))
            .map(|compiled| compiled.definition().as_ref())
            .chain(matcher.not_found_route().map(|r| r.as_ref()))
            .chain(matcher.server_error_route().map(|r| r.as_ref()));
        for route in definitions {
            handlers.resolve(route.handler())?;
            for id in route.middleware() {
                middleware.resolve(id)?;
            }
        }

        tracing::info!(
            routes = matcher.len(),
            middleware = middleware.len(),
            handlers = handlers.len(),
            "Dispatcher ready"
        );

        Ok(Self {
            routes,
            middleware,
            handlers,
            acl,
        })
    }

    pub fn routes(&self) -> &HostRoutes {
        &self.routes
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn acl(&self) -> &AclEngine {
        &self.acl
    }

    /// Route lookup only; runs no middleware or handler.
    pub fn resolve(&self, method: HttpMethod, host: &str, path: &str) -> Result<RouteMatch, Error> {
        self.routes.for_host(host)?.resolve(method, path)
    }

    /// Run `req` through the pipeline.
    ///
    /// Denials and redirects come back as `Ok` responses. `Err` means no
    /// route matched with no 404 route, or a handler failed with no working
    /// 500 route.
    pub fn dispatch(&self, mut req: Request) -> Result<Response, Error> {
        let start = Instant::now();
        let result = self.run(&mut req);

        let status = match &result {
            Ok(res) => res.status(),
            Err(e) => e.status(),
        };
        let route = req.route().map(|r| r.pattern.as_str()).unwrap_or("none");
        metrics::record_request(req.method().as_str(), status.as_u16(), route, start);

        result
    }

    fn run(&self, req: &mut Request) -> Result<Response, Error> {
        let matcher = self.routes.for_host(req.host())?;
        let RouteMatch { route, slugs, fallback } = matcher.resolve(req.method(), req.path())?;
        req.set_match(route.matched(fallback), slugs);

        let mut res = if fallback {
            Response::with_status(StatusCode::NOT_FOUND)
        } else {
            Response::new()
        };

        let chain = MiddlewareChain::for_route(&self.middleware, matcher.global_middleware(), &route)?;
        if chain.run(req, &mut res) != ResponseState::Continue {
            metrics::record_halt("middleware");
            return Ok(res);
        }

        if !self.authorize(req, &route) {
            tracing::info!(
                request_id = %req.id(),
                route = %route.pattern(),
                handler = ?route.handler(),
                "ACL denied request"
            );
            res.deny(StatusCode::FORBIDDEN, "Forbidden");
            metrics::record_halt("acl");
            return Ok(res);
        }

        let handler = self.handlers.resolve(route.handler())?;
        match call_guarded(handler.as_ref(), req, &mut res) {
            Ok(()) => Ok(res),
            Err(err) => self.recover(&matcher, req, res, err),
        }
    }

    fn authorize(&self, req: &Request, route: &RouteDefinition) -> bool {
        let (requirement, controller, action) = match (route.acl(), route.handler()) {
            (Some(requirement), HandlerRef::Target { controller, action }) => (requirement, controller, action),
            _ => return true,
        };
        match requirement {
            AclRequirement::Any => !self.acl.is_allowed(controller, action, req.principal()).is_denied(),
            AclRequirement::Granule(granule) => {
                self.acl
                    .is_permission_allowed(controller, action, req.principal(), granule)
            }
        }
    }

    /// Hand a failed request to the 500 route, if one exists. Headers set
    /// by middleware carry over to the error page.
    fn recover(
        &self,
        matcher: &RouteMatcher,
        req: &mut Request,
        mut res: Response,
        err: HandlerError,
    ) -> Result<Response, Error> {
        tracing::error!(
            request_id = %req.id(),
            path = %req.path(),
            error = %err,
            "Handler failed"
        );

        let Some(route) = matcher.server_error_route() else {
            metrics::record_handler_failure(false);
            return Err(Error::Handler(err));
        };
        tracing::warn!(request_id = %req.id(), route = %route.pattern(), "Using 500 route");

        req.set_match(route.matched(false), route.slugs().to_vec());
        res.restart(StatusCode::INTERNAL_SERVER_ERROR);
        let handler = self.handlers.resolve(route.handler())?;
        match call_guarded(handler.as_ref(), req, &mut res) {
            Ok(()) => {
                metrics::record_handler_failure(true);
                Ok(res)
            }
            Err(second) => {
                tracing::error!(request_id = %req.id(), error = %second, "500 route failed");
                metrics::record_handler_failure(false);
                Err(Error::Handler(second))
            }
        }
    }
}
