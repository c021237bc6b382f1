//! Request handlers and their registry.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Error, HandlerError, HandlerPanic};
use crate::http::{Request, Response};
use crate::routing::HandlerRef;

/// The last pipeline stage: produces the response body.
///
/// Slugs, the matched route and caller attributes are read from the
/// request. A returned error routes the request to the 500 route.
pub trait Handler: Send + Sync {
    fn call(&self, req: &Request, res: &mut Response) -> Result<(), HandlerError>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, req: &Request, res: &mut Response) -> Result<(), HandlerError> {
        (**self).call(req, res)
    }
}

/// Call `handler`, turning a panic into a [`HandlerPanic`] error.
pub fn call_guarded(handler: &dyn Handler, req: &Request, res: &mut Response) -> Result<(), HandlerError> {
    panic::catch_unwind(AssertUnwindSafe(|| handler.call(req, res)))
        .unwrap_or_else(|payload| Err(HandlerPanic::from_payload(payload).into()))
}

/// Handler built from a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request, &mut Response) -> Result<(), HandlerError> + Send + Sync,
{
    fn call(&self, req: &Request, res: &mut Response) -> Result<(), HandlerError> {
        (self.f)(req, res)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// Wrap a closure as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request, &mut Response) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler { f }
}

/// Registry key for a controller/action pair.
pub fn handler_key(controller: &str, action: &str) -> String {
    format!("{}@{}", controller, action)
}

/// Controller/action → handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `controller`/`action`, replacing any previous one.
    pub fn register(&mut self, controller: &str, action: &str, handler: impl Handler + 'static) -> Result<(), Error> {
        if controller.trim().is_empty() || action.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "handler controller and action must not be empty".to_string(),
            ));
        }
        self.handlers.insert(handler_key(controller, action), Arc::new(handler));
        Ok(())
    }

    pub fn get(&self, controller: &str, action: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&handler_key(controller, action)).cloned()
    }

    /// Handler a route points at. Inline handlers resolve to themselves.
    pub fn resolve(&self, handler: &HandlerRef) -> Result<Arc<dyn Handler>, Error> {
        match handler {
            HandlerRef::Inline(h) => Ok(h.clone()),
            HandlerRef::Target { controller, action } => self
                .get(controller, action)
                .ok_or_else(|| Error::UnknownHandler(handler_key(controller, action))),
        }
    }

    /// Add entries from `other` whose keys are not registered yet.
    pub fn merge_missing(&mut self, other: HandlerRegistry) {
        for (key, handler) in other.handlers {
            self.handlers.entry(key).or_insert(handler);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    fn hello() -> impl Handler {
        handler_fn(|_, res| {
            res.set_text("hello");
            Ok(())
        })
    }

    #[test]
    fn test_resolve_target() {
        let mut registry = HandlerRegistry::new();
        registry.register("Visitors", "index", hello()).unwrap();

        let handler = registry.resolve(&HandlerRef::target("Visitors", "index")).unwrap();
        let mut res = Response::new();
        handler.call(&Request::new(HttpMethod::Get, "/"), &mut res).unwrap();
        assert_eq!(res.text(), "hello");
    }

    #[test]
    fn test_unknown_target() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve(&HandlerRef::target("Visitors", "show")).err().unwrap();
        assert!(matches!(err, Error::UnknownHandler(ref key) if key == "Visitors@show"));
    }

    #[test]
    fn test_inline_resolves_to_itself() {
        let registry = HandlerRegistry::new();
        let inline = HandlerRef::Inline(Arc::new(hello()));
        assert!(registry.resolve(&inline).is_ok());
    }

    #[test]
    fn test_empty_names_rejected() {
        let mut registry = HandlerRegistry::new();
        assert!(matches!(
            registry.register("", "index", hello()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panic_becomes_handler_error() {
        let boom = handler_fn(|_, _| panic!("visitor list unavailable"));
        let req = Request::new(HttpMethod::Get, "/boom/");
        let err = call_guarded(&boom, &req, &mut Response::new()).unwrap_err();
        assert_eq!(err.to_string(), "handler panicked: visitor list unavailable");

        let ok = call_guarded(&hello(), &req, &mut Response::new());
        assert!(ok.is_ok());
    }
}
