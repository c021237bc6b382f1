//! End-to-end pipeline tests: configuration in, responses out.

mod common;

use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use doorpad::acl::{AclEngine, Authorization, CallerAttributes, FieldMatchSet, Granules};
use doorpad::dispatch::{handler_fn, Dispatcher, HandlerRegistry};
use doorpad::http::{HttpMethod, Request, Response, ResponseState};
use doorpad::middleware::{from_fn, MiddlewareRegistry};
use doorpad::routing::{HostRoutes, RouteOptions, RouteSource, RouteTable};
use doorpad::Error;

use common::{dispatcher_from, dispatcher_with, recording, test_handlers};

fn get(path: &str) -> Request {
    Request::new(HttpMethod::Get, path)
}

#[test]
fn test_first_registered_route_wins() {
    let dispatcher = dispatcher_from(
        r#"
        [[routing.routes]]
        url = "/visitors/{slug}/"
        controller = "Visitors"
        action = "show"
        slugs = "first"

        [[routing.routes]]
        url = "/visitors/{alpha}/"
        controller = "Visitors"
        action = "show"
        slugs = "second"
        "#,
    );

    let res = dispatcher.dispatch(get("/visitors/ada/")).unwrap();
    assert_eq!(res.text(), "ada,first");
}

#[test]
fn test_routes_are_method_scoped() {
    let dispatcher = dispatcher_from(
        r#"
        [[routing.routes]]
        url = "/a/"
        controller = "Visitors"
        action = "show"
        http_method = "get"
        "#,
    );

    assert_eq!(dispatcher.dispatch(get("/a/")).unwrap().status(), StatusCode::OK);
    let err = dispatcher.dispatch(Request::new(HttpMethod::Post, "/a/")).unwrap_err();
    assert!(matches!(err, Error::RouteNotFound { method: HttpMethod::Post, .. }));
}

#[test]
fn test_unmatched_method_falls_back_to_404_route() {
    let dispatcher = dispatcher_from(
        r#"
        [[routing.routes]]
        url = "/a/"
        controller = "Visitors"
        action = "show"
        http_method = "get"

        [[routing.routes]]
        url = "/not-found/"
        controller = "Errors"
        action = "not_found"
        http_method = "get"
        404 = true
        "#,
    );

    let res = dispatcher.dispatch(Request::new(HttpMethod::Delete, "/a/")).unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text(), "Not Found");
}

#[test]
fn test_regex_tag_substitution() {
    let dispatcher = dispatcher_from(
        r#"
        [routing]
        regex = { "{num}" = "[0-9]+" }

        [[routing.routes]]
        url = "/item/{num}/"
        controller = "Visitors"
        action = "show"
        "#,
    );

    assert_eq!(dispatcher.dispatch(get("/item/42/")).unwrap().text(), "42");
    assert!(matches!(
        dispatcher.dispatch(get("/item/abc/")),
        Err(Error::RouteNotFound { .. })
    ));
}

#[test]
fn test_denying_middleware_stops_chain_and_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut middleware = MiddlewareRegistry::new();
    recording(&log, &mut middleware, &["first", "third"]);
    let deny_log = log.clone();
    middleware
        .register(
            "second",
            from_fn(move |_: &mut Request, res: &mut Response| {
                deny_log.lock().unwrap().push("second".to_string());
                res.deny(StatusCode::FORBIDDEN, "stop");
            }),
        )
        .unwrap();

    let called = Arc::new(Mutex::new(false));
    let flag = called.clone();
    let mut handlers = test_handlers();
    handlers
        .register(
            "Visitors",
            "guarded",
            handler_fn(move |_, _| {
                *flag.lock().unwrap() = true;
                Ok(())
            }),
        )
        .unwrap();

    let source: RouteSource = Arc::new(|t: &mut RouteTable| {
        t.add_global_middleware(["first", "second"])?;
        t.set("/guarded/", RouteOptions::to("Visitors", "guarded").middleware("third"))
    });
    let dispatcher = Dispatcher::new(HostRoutes::new(source, 4), middleware, handlers, AclEngine::new()).unwrap();

    let res = dispatcher.dispatch(get("/guarded/")).unwrap();
    assert_eq!(res.state(), ResponseState::Denied);
    assert_eq!(res.text(), "stop");
    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    assert!(!*called.lock().unwrap());
}

#[test]
fn test_acl_first_matching_rule_wins() {
    let mut acl = AclEngine::new();
    acl.allow_fields("Visitors", "show", FieldMatchSet::new().field("role", "admin"), ["read"])
        .unwrap();
    acl.allow_fields(
        "Visitors",
        "show",
        FieldMatchSet::new().field("role", "admin"),
        ["read", "write"],
    )
    .unwrap();

    let admin = CallerAttributes::new().with("role", "admin");
    assert_eq!(
        acl.is_allowed("Visitors", "show", &admin),
        Authorization::from(&Granules::only(["read"]))
    );
    assert!(!acl.is_permission_allowed("Visitors", "show", &admin, "write"));
}

#[test]
fn test_acl_default_deny() {
    let acl = AclEngine::new();
    let guest = CallerAttributes::new().with("role", "guest");
    assert_eq!(acl.is_allowed("X", "y", &guest), Authorization::Denied);
}

#[test]
fn test_acl_gated_route_from_config() {
    let dispatcher = dispatcher_from(
        r#"
        [routing]
        global_middleware = ["principal_headers"]

        [[routing.routes]]
        url = "/visitors/"
        controller = "Visitors"
        action = "whoami"
        acl = "list"

        [[acl.rules]]
        controller = "Visitors"
        action = "whoami"
        fields = { role = ["admin", "reception"] }
        granules = ["list"]

        [[acl.rules]]
        controller = "Visitors"
        action = "whoami"
        fields = { role = "guest" }
        granules = ["badge"]
        "#,
    );

    let as_role = |role: &str| get("/visitors/").with_header("x-doorpad-role", role);

    let res = dispatcher.dispatch(as_role("reception")).unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text(), "reception");

    let res = dispatcher.dispatch(as_role("guest")).unwrap();
    assert_eq!(res.state(), ResponseState::Denied);
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = dispatcher.dispatch(get("/visitors/")).unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_global_middleware_keeps_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut middleware = MiddlewareRegistry::new();
    recording(&log, &mut middleware, &["a", "b", "c", "route"]);

    let source: RouteSource = Arc::new(|t: &mut RouteTable| {
        t.add_global_middleware(["a", "b"])?;
        t.add_global_middleware("c")?;
        t.set("/", RouteOptions::to("Visitors", "show").middleware("route"))
    });
    let dispatcher = Dispatcher::new(HostRoutes::new(source, 4), middleware, test_handlers(), AclEngine::new()).unwrap();

    dispatcher.dispatch(get("/")).unwrap();
    assert_eq!(*log.lock().unwrap(), ["a", "b", "c", "route"]);
}

#[test]
fn test_route_can_opt_out_of_globals() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut middleware = MiddlewareRegistry::new();
    recording(&log, &mut middleware, &["audit"]);

    let dispatcher = dispatcher_with(
        r#"
        [routing]
        global_middleware = ["audit"]

        [[routing.routes]]
        url = "/health/"
        controller = "Health"
        action = "check"
        global_middleware = false
        "#,
        middleware,
    );

    assert_eq!(dispatcher.dispatch(get("/health/")).unwrap().text(), "ok");
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_domain_wildcard_matches_one_label() {
    let dispatcher = dispatcher_from(
        r#"
        [[routing.domains]]
        hosts = ["*.example.com"]

        [[routing.domains.routes]]
        url = "/lobby/"
        controller = "Visitors"
        action = "show"
        slugs = "lobby"
        "#,
    );

    let on = |host: &str| get("/lobby/").with_host(host);

    assert_eq!(dispatcher.dispatch(on("foo.example.com")).unwrap().text(), "lobby");
    assert_eq!(dispatcher.dispatch(on("foo.example.com:8080")).unwrap().text(), "lobby");
    assert!(dispatcher.dispatch(on("example.com")).is_err());
    assert!(dispatcher.dispatch(on("foo.bar.example.com")).is_err());
    assert!(dispatcher.dispatch(on("FOO.Example.com")).is_err());
}

#[test]
fn test_require_principal_redirects_to_login() {
    let dispatcher = dispatcher_from(
        r#"
        [routing]
        global_middleware = ["principal_headers", "require_principal"]

        [middleware]
        login_url = "/login/"

        [[routing.routes]]
        url = "/visitors/"
        controller = "Visitors"
        action = "whoami"
        "#,
    );

    let res = dispatcher.dispatch(get("/visitors/")).unwrap();
    assert_eq!(res.state(), ResponseState::Redirected);
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.header("location"), Some("/login/"));

    let res = dispatcher
        .dispatch(get("/visitors/").with_header("x-doorpad-role", "admin"))
        .unwrap();
    assert_eq!(res.state(), ResponseState::Continue);
    assert_eq!(res.text(), "admin");
}

#[test]
fn test_principal_headers_need_gateway_secret() {
    let dispatcher = dispatcher_from(
        r#"
        [routing]
        global_middleware = ["principal_headers"]

        [middleware]
        gateway_secret = "kiosk-gateway"

        [[routing.routes]]
        url = "/whoami/"
        controller = "Visitors"
        action = "whoami"
        "#,
    );

    let spoofed = get("/whoami/").with_header("x-doorpad-role", "admin");
    assert_eq!(dispatcher.dispatch(spoofed).unwrap().text(), "");

    let forwarded = get("/whoami/")
        .with_header("x-doorpad-role", "admin")
        .with_header("x-doorpad-gateway-secret", "kiosk-gateway");
    assert_eq!(dispatcher.dispatch(forwarded).unwrap().text(), "admin");
}

#[test]
fn test_handler_error_goes_to_500_route() {
    let dispatcher = dispatcher_from(
        r#"
        [[routing.routes]]
        url = "/broken/"
        controller = "Visitors"
        action = "fail"

        [[routing.routes]]
        url = "/error/"
        controller = "Errors"
        action = "server_error"
        500 = true
        "#,
    );

    let res = dispatcher.dispatch(get("/broken/")).unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text(), "Internal Server Error");
}

#[test]
fn test_configuration_errors_abort_bootstrap() {
    let config = doorpad::config::parse_config(
        r#"
        [routing]
        global_middleware = ["not_registered"]
        "#,
    )
    .unwrap();
    let err = doorpad::lifecycle::bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidListener(_)));

    let config = doorpad::config::parse_config(
        r#"
        [routing]
        regex = { "{bad}" = "([0-9]" }
        "#,
    )
    .unwrap();
    let err = doorpad::lifecycle::bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidPattern(_)));

    let config = doorpad::config::parse_config(
        r#"
        [[acl.rules]]
        controller = "Visitors"
        action = "show"
        fields = {}
        "#,
    )
    .unwrap();
    let err = doorpad::lifecycle::bootstrap(&config, MiddlewareRegistry::new(), HandlerRegistry::new()).unwrap_err();
    assert!(matches!(err, Error::EmptyFieldSet { .. }));
}
