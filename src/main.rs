//! doorpad server and configuration tooling.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use doorpad::config::{load_config, ConfigError, DoorpadConfig};
use doorpad::dispatch::HandlerRegistry;
use doorpad::http::HttpMethod;
use doorpad::lifecycle::{bootstrap, signals, Shutdown};
use doorpad::middleware::MiddlewareRegistry;
use doorpad::observability::{logging, metrics};
use doorpad::{Dispatcher, Error, HttpServer};

#[derive(Parser)]
#[command(name = "doorpad")]
#[command(about = "Request pipeline for the doorpad visitor kiosk", long_about = None)]
struct Cli {
    #[arg(short, long, global = true, default_value = "doorpad.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Load, validate and bootstrap the configuration, then print the routes
    Check {
        /// Host to build the route table for (default: every domain group)
        #[arg(long)]
        host: Option<String>,
    },
    /// Resolve one request against the configured routes
    Match {
        #[arg(long)]
        host: Option<String>,
        /// GET, POST, PUT, DELETE or AJAX
        method: HttpMethod,
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Check { host } => {
            let dispatcher = build(&config)?;
            print_routes(&dispatcher, host.as_deref())?;
        }
        Commands::Match { host, method, path } => {
            let dispatcher = build(&config)?;
            let host = host.unwrap_or_else(|| config.server.default_host.clone());
            match dispatcher.resolve(method, &host, &path) {
                Ok(m) => {
                    let route = m.route.matched(m.fallback);
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                        "route": route,
                        "handler": format!("{:?}", m.route.handler()),
                        "middleware": m.route.middleware(),
                        "slugs": m.slugs,
                    }))?);
                }
                Err(e @ Error::RouteNotFound { .. }) => {
                    println!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

fn build(config: &DoorpadConfig) -> Result<Dispatcher, ConfigError> {
    Ok(bootstrap(config, MiddlewareRegistry::new(), HandlerRegistry::new())?)
}

async fn serve(config: DoorpadConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "doorpad starting");

    let dispatcher = Arc::new(build(&config)?);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    HttpServer::new(dispatcher, &config.server)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_routes(dispatcher: &Dispatcher, host: Option<&str>) -> Result<(), Error> {
    let matcher = match host {
        Some(host) => dispatcher.routes().for_host(host)?,
        None => Arc::new(dispatcher.routes().validate()?),
    };

    println!("global middleware: {:?}", matcher.global_middleware());
    for method in HttpMethod::ALL {
        for route in matcher.routes(method) {
            let def = route.definition();
            println!(
                "{:<7} {:<32} {:?} middleware={:?}",
                method.as_str(),
                def.pattern(),
                def.handler(),
                def.middleware()
            );
        }
    }
    if let Some(route) = matcher.not_found_route() {
        println!("404     {:<32} {:?}", route.pattern(), route.handler());
    }
    if let Some(route) = matcher.server_error_route() {
        println!("500     {:<32} {:?}", route.pattern(), route.handler());
    }
    println!("{} route(s)", matcher.len());
    Ok(())
}
