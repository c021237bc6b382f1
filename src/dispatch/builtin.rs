//! Handlers every deployment gets.

use axum::http::StatusCode;
use serde::Serialize;

use super::handler::{handler_fn, HandlerRegistry};
use crate::acl::CallerAttributes;
use crate::error::Error;
use crate::http::{HttpMethod, MatchedRoute};

#[derive(Serialize)]
struct Echo<'a> {
    request_id: &'a str,
    method: HttpMethod,
    host: &'a str,
    path: &'a str,
    route: Option<&'a MatchedRoute>,
    slugs: &'a [String],
    principal: &'a CallerAttributes,
}

/// Register `Health@check`, `Echo@request`, `Errors@not_found` and
/// `Errors@server_error`, keeping any the application registered first.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry) -> Result<(), Error> {
    let mut builtins = HandlerRegistry::new();
    register_all(&mut builtins)?;
    registry.merge_missing(builtins);
    Ok(())
}

fn register_all(registry: &mut HandlerRegistry) -> Result<(), Error> {
    registry.register(
        "Health",
        "check",
        handler_fn(|_, res| {
            res.set_text("ok");
            Ok(())
        }),
    )?;

    registry.register(
        "Echo",
        "request",
        handler_fn(|req, res| {
            res.set_json(&Echo {
                request_id: req.id(),
                method: req.method(),
                host: req.host(),
                path: req.path(),
                route: req.route(),
                slugs: req.slugs(),
                principal: req.principal(),
            })?;
            Ok(())
        }),
    )?;

    registry.register(
        "Errors",
        "not_found",
        handler_fn(|_, res| {
            res.set_status(StatusCode::NOT_FOUND);
            res.set_text("Not Found");
            Ok(())
        }),
    )?;

    registry.register(
        "Errors",
        "server_error",
        handler_fn(|_, res| {
            res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            res.set_text("Internal Server Error");
            Ok(())
        }),
    )?;

    Ok(())
}
