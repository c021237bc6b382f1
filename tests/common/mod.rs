//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use doorpad::config::parse_config;
use doorpad::dispatch::{handler_fn, HandlerRegistry};
use doorpad::http::{Request, Response};
use doorpad::lifecycle::bootstrap;
use doorpad::middleware::{from_fn, MiddlewareRegistry};
use doorpad::{Dispatcher, HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Handlers the test configurations route to.
///
/// - `Visitors@show`: body is the slugs joined by commas
/// - `Visitors@whoami`: body is the caller's `role` attribute
/// - `Visitors@fail`: always errors
pub fn test_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    handlers
        .register(
            "Visitors",
            "show",
            handler_fn(|req, res| {
                res.set_text(req.slugs().join(","));
                Ok(())
            }),
        )
        .unwrap();
    handlers
        .register(
            "Visitors",
            "whoami",
            handler_fn(|req, res| {
                let role = req.principal().get("role").map(|r| r.to_string()).unwrap_or_default();
                res.set_text(role);
                Ok(())
            }),
        )
        .unwrap();
    handlers
        .register("Visitors", "fail", handler_fn(|_, _| Err("visitor log unavailable".into())))
        .unwrap();
    handlers
}

/// Middleware that appends its id to `log` and continues.
pub fn recording(log: &Arc<Mutex<Vec<String>>>, registry: &mut MiddlewareRegistry, ids: &[&str]) {
    for id in ids {
        let log = log.clone();
        let name = id.to_string();
        registry
            .register(
                id,
                from_fn(move |_: &mut Request, _: &mut Response| log.lock().unwrap().push(name.clone())),
            )
            .unwrap();
    }
}

/// Bootstrap a dispatcher from TOML text with the test handlers.
pub fn dispatcher_from(toml: &str) -> Dispatcher {
    dispatcher_with(toml, MiddlewareRegistry::new())
}

pub fn dispatcher_with(toml: &str, middleware: MiddlewareRegistry) -> Dispatcher {
    let config = parse_config(toml).unwrap();
    bootstrap(&config, middleware, test_handlers()).unwrap()
}

/// A server on a loopback port. Dropping the handle does not stop it;
/// call [`TestServer::stop`].
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub async fn start(toml: &str) -> Self {
        let config = parse_config(toml).unwrap();
        let dispatcher = bootstrap(&config, MiddlewareRegistry::new(), test_handlers()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(Arc::new(dispatcher), &config.server);
        let task = tokio::spawn(server.run(listener, shutdown.signalled()));

        Self { addr, shutdown, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap();
    }
}
