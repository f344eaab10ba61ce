use axum::{response::IntoResponse, routing::get};
use loadtest_gateway::{AppState, Config, build_router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Ensure a directory exists, creating it if necessary.
fn ensure_directory(path: &Path, name: &str) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created {} directory: {:?}", name, path);
        Ok(())
    } else if path.is_dir() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} path {:?} exists but is not a directory", name, path),
        ))
    }
}

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    // Initialize tracing; RUST_LOG wins over LOGGING_LEVEL
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "loadtest_gateway={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Loaded configuration: host={}, port={}, static_dir={:?}",
        config.host, config.port, config.run.static_dir
    );
    info!(
        "Engine: {:?}, visualizer: {:?}, max concurrent runs: {}, retention: {:?}",
        config.run.engine_command,
        config.run.visualizer_command,
        config.run.max_concurrent_runs,
        config.run.run_retention
    );
    match &config.run.config_template {
        Some(path) => info!("Config template: {:?}", path),
        None => info!("Using built-in config template"),
    }

    // Initialize Prometheus metrics recorder before any metrics are recorded
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    ensure_directory(&config.run.static_dir, "static")?;

    let app_state = AppState::from_config(&config)?;

    // Periodic update of gauge metrics (every 5 seconds)
    let metrics_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let tracker = metrics_state.runs.tracker();
            metrics::gauge!("loadtest_runs_active").set(tracker.active_count() as f64);
            metrics::gauge!("loadtest_uptime_seconds")
                .set(metrics_state.started_at.elapsed().as_secs() as f64);
        }
    });

    let app = build_router(app_state).route("/metrics/prometheus", get(prometheus_metrics));

    if config.run.run_timeout.is_none() {
        warn!("RUN_TIMEOUT_SECS not set - a hung load test holds its worker slot indefinitely");
    }

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Load-test gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
