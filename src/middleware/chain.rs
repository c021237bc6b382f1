//! Ordered middleware execution with short-circuit.

use std::sync::Arc;

use super::{Middleware, MiddlewareRegistry};
use crate::error::Error;
use crate::http::{Request, Response, ResponseState};
use crate::routing::RouteDefinition;

/// Stages for one request: globals first, then the route's own.
pub struct MiddlewareChain {
    stages: Vec<(String, Arc<dyn Middleware>)>,
}

impl MiddlewareChain {
    /// Resolve `globals` followed by `route_ids`.
    pub fn build(registry: &MiddlewareRegistry, globals: &[String], route_ids: &[String]) -> Result<Self, Error> {
        let stages = globals
            .iter()
            .chain(route_ids)
            .map(|id| registry.resolve(id).map(|mw| (id.clone(), mw)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stages })
    }

    /// Chain for `route`, honouring its opt-out of global middleware.
    pub fn for_route(registry: &MiddlewareRegistry, globals: &[String], route: &RouteDefinition) -> Result<Self, Error> {
        let globals: &[String] = if route.uses_global_middleware() { globals } else { &[] };
        Self::build(registry, globals, route.middleware())
    }

    /// Identifiers in execution order.
    pub fn ids(&self) -> Vec<&str> {
        self.stages.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, stopping after the first one that leaves
    /// the response denied or redirected.
    pub fn run(&self, req: &mut Request, res: &mut Response) -> ResponseState {
        for (id, middleware) in &self.stages {
            middleware.handle(req, res);
            if res.is_halted() {
                tracing::info!(
                    request_id = %req.id(),
                    middleware = %id,
                    state = res.state().as_str(),
                    status = res.status().as_u16(),
                    "Middleware halted request"
                );
                return res.state();
            }
        }
        ResponseState::Continue
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain").field("stages", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::middleware::from_fn;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    fn recorder(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> impl Middleware {
        from_fn(move |_: &mut Request, _: &mut Response| log.lock().unwrap().push(name.to_string()))
    }

    #[test]
    fn test_globals_run_before_route_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MiddlewareRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(name, recorder(log.clone(), name)).unwrap();
        }

        let chain = MiddlewareChain::build(&registry, &["a".into(), "b".into()], &["c".into()]).unwrap();
        let state = chain.run(&mut Request::new(HttpMethod::Get, "/"), &mut Response::new());

        assert_eq!(state, ResponseState::Continue);
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_deny_stops_remaining_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MiddlewareRegistry::new();
        registry.register("first", recorder(log.clone(), "first")).unwrap();
        let deny_log = log.clone();
        registry
            .register(
                "deny",
                from_fn(move |_: &mut Request, res: &mut Response| {
                    deny_log.lock().unwrap().push("deny".to_string());
                    res.deny(StatusCode::FORBIDDEN, "no");
                }),
            )
            .unwrap();
        registry.register("third", recorder(log.clone(), "third")).unwrap();

        let chain = MiddlewareChain::build(
            &registry,
            &["first".into(), "deny".into(), "third".into()],
            &[],
        )
        .unwrap();
        let mut res = Response::new();
        let state = chain.run(&mut Request::new(HttpMethod::Get, "/"), &mut res);

        assert_eq!(state, ResponseState::Denied);
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), ["first", "deny"]);
    }

    #[test]
    fn test_redirect_halts() {
        let mut registry = MiddlewareRegistry::new();
        registry
            .register("login", from_fn(|_: &mut Request, res: &mut Response| res.redirect("/login/")))
            .unwrap();
        let chain = MiddlewareChain::build(&registry, &[], &["login".into()]).unwrap();
        let mut res = Response::new();
        assert_eq!(
            chain.run(&mut Request::new(HttpMethod::Get, "/"), &mut res),
            ResponseState::Redirected
        );
    }

    #[test]
    fn test_unknown_identifier_fails_build() {
        let registry = MiddlewareRegistry::new();
        let result = MiddlewareChain::build(&registry, &["ghost".into()], &[]);
        assert!(matches!(result, Err(Error::InvalidListener(_))));
    }
}
