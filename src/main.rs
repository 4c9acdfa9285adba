#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
mod config;
mod metrics;
mod poll;

use std::{process::ExitCode, sync::Arc};

use axum::{
    extract::Request,
    http::{header::CACHE_CONTROL, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{config::Config, metrics::Registry, poll::Poller};

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let path = Config::path_from_env();
    let config = match Config::load(&path) {
        Ok(config) => Arc::new(config),
        Err(error) => {
            start_tracing(false);
            error!(%error, path = %path, "Could not load configuration");
            return ExitCode::FAILURE;
        }
    };
    start_tracing(config.debug);
    info!(
        path = %path,
        listen = %config.listen_address,
        targets = config.targets.len(),
        protocol = config.protocol_version,
        interval = ?config.poll_interval,
        "Loaded configuration"
    );

    let registry = Arc::new(Registry::new());
    let app = axum::Router::new()
        .route("/metrics", get(metrics::handle_metrics))
        .route("/health", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn(noindex_nocache))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&registry));

    let tcp = match TcpListener::bind(config.listen_address.as_str()).await {
        Ok(tcp) => tcp,
        Err(error) => {
            error!(%error, address = %config.listen_address, "Could not bind metrics listener");
            return ExitCode::FAILURE;
        }
    };

    let poller = Poller::new(Arc::clone(&config), registry, pyng::tokio::resolver());
    tokio::spawn(poller.run());

    info!(address = %config.listen_address, "Serving metrics");
    if let Err(error) = axum::serve(tcp, app)
        .with_graceful_shutdown(vss::shutdown_signal())
        .await
    {
        error!(%error, "Metrics server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

static ROBOTS_NAME: HeaderName = HeaderName::from_static("x-robots-tag");
static ROBOTS_VALUE: HeaderValue = HeaderValue::from_static("noindex");
static NO_STORE: HeaderValue = HeaderValue::from_static("no-store");

async fn noindex_nocache(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert(ROBOTS_NAME.clone(), ROBOTS_VALUE.clone());
    resp.headers_mut().insert(CACHE_CONTROL, NO_STORE.clone());
    resp
}

fn start_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let directives = std::env::var("LOG")
        .unwrap_or_else(|_| format!("mcping_exporter={level},pyng={level},tower_http={level}"));
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}
