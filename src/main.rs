use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vidflow::api::{create_status_router, StatusAppState};
use vidflow::config::{load_config, PipelineConfig};
use vidflow::metrics::{run_metrics_reporter, PipelineMetrics};
use vidflow::nats::NatsClient;
use vidflow::pipeline::{self, Pipeline};
use vidflow::quality::QualityMonitor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidflow=info".into()),
        )
        .init();

    info!("vidflow starting...");

    let config_path = std::env::var("VIDFLOW_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&config_path).exists() {
        load_config(&config_path)?
    } else {
        info!(path = %config_path, "No config file, using defaults");
        PipelineConfig::default()
    };
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    info!(
        window_seconds = config.window.size_seconds,
        anomaly_threshold = config.processing.anomaly_confidence_threshold,
        shutdown_policy = ?config.window.shutdown_policy,
        nats_url = %config.nats.url,
        "Configuration loaded"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let monitor = QualityMonitor::new(config.monitor.retention_minutes, config.monitor.max_records);
    let pipeline = Arc::new(Pipeline::new(&config, Arc::clone(&metrics), monitor.clone()));

    let nats = NatsClient::connect(config.nats.clone()).await?;

    let reporter_handle = tokio::spawn(run_metrics_reporter(
        Arc::clone(&metrics),
        monitor.clone(),
        config.metrics.report_interval_seconds,
        config.metrics.active_source_window_seconds,
        config.monitor.report_window_minutes,
    ));

    // Start HTTP status API
    let server_handle = if config.api.enabled {
        let router = create_status_router(StatusAppState {
            metrics: Arc::clone(&metrics),
            monitor: monitor.clone(),
            monitor_config: config.monitor.clone(),
            active_source_window_seconds: config.metrics.active_source_window_seconds,
        });
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
            .await
            .context("Failed to bind status API port")?;
        info!(port = config.api.port, "Status API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Status API server error");
            }
        }))
    } else {
        None
    };

    // Runs until ctrl_c, then applies the shutdown policy
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
        }
        info!("Shutdown signal received");
    };
    let result = pipeline::run(
        Arc::clone(&pipeline),
        nats.jetstream().clone(),
        &config.nats,
        Duration::from_secs(config.window.tick_interval_seconds),
        shutdown,
    )
    .await;

    // Graceful shutdown
    reporter_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("vidflow stopped");

    result
}
