//! Order Fraud Scoring - Main Entry Point
//!
//! Loads the training artifacts, verifies the feature schema, and serves
//! predictions over HTTP. Nothing is served if any artifact fails to load.

use anyhow::{Context, Result};
use order_fraud_scoring::{
    api,
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::MetricsReporter,
    Scorer,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    init_logging(&config.logging)?;
    info!(config = %config_path, "Starting Order Fraud Scoring service");
    info!(
        policy = config.detection.policy.as_str(),
        threshold = config.detection.threshold.value(),
        max_batch_size = config.detection.max_batch_size,
        "Detection settings"
    );

    // Load artifacts and run the schema self-check before binding
    let scorer = Arc::new(Scorer::load(&config).context("Failed to load scoring artifacts")?);

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(scorer.metrics().clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = api::router(scorer.clone());

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    scorer.metrics().print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("order_fraud_scoring={},tower_http=info", logging.level)))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
