use anyhow::{anyhow, Context, Result};
use axum::{extract::Path, http::StatusCode, routing::get, Router};
use prom_middleware::{exposition, AppConfig, HttpMetrics, MetricsLayer};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal server error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    let listen: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen))?;

    let metrics =
        HttpMetrics::with_default_registry(&config.metrics).context("build http metrics")?;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/users/:id", get(get_user))
        .layer(MetricsLayer::new(metrics))
        .route(
            "/metrics",
            get(exposition::metrics_handler).with_state(prometheus::default_registry().clone()),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!(
        address = %listen,
        subsystem = %config.metrics.subsystem,
        buckets = ?config.metrics.effective_buckets()?,
        "metrics demo server online"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    Ok(())
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn get_user(Path(id): Path<u64>) -> Result<String, StatusCode> {
    if id == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(format!("user {id}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl_c listener error");
    }
    info!("shutdown signal received, exiting");
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
