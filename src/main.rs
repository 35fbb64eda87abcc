//! Property Price Service - Main Entry Point
//!
//! Loads the model and encoder artifacts once, then serves the prediction
//! form and JSON endpoints over HTTP.

use anyhow::{Context, Result};
use property_price_service::{
    app::{create_router, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    service::PredictionService,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("property_price_service={}", logging.level).parse()?);

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Property Price Service");
    info!(
        models_dir = %config.models.models_dir,
        encoders = %config.encoders.path,
        strategy = ?config.models.strategy,
        "Configuration loaded successfully"
    );

    // Initialize metrics
    let metrics = Arc::new(ServiceMetrics::new());

    // Artifacts are loaded exactly once; the process does not serve without them
    let service = match PredictionService::load(&config, metrics.clone()) {
        Ok(service) => service,
        Err(e) => {
            error!(error = ?e, "Failed to load model artifacts");
            return Err(e);
        }
    };
    info!("Health: {:?}", service.health());

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let app = create_router(AppState::new(service));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
