pub mod adapters;
pub mod api;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod healthcheck;
pub mod metrics;
pub mod orchestrator;
pub mod transport;

use crate::api::AppState;
use crate::config::{IntegrationConfig, LogFormat};
use crate::error::{IntegrationError, Result};
use crate::metrics::MetricsService;
use crate::orchestrator::BackendIntegrator;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the integration service and serve until shutdown
pub async fn init_server(config: IntegrationConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!(
        environment = ?config.environment,
        backend_mode = ?config.backend_mode,
        "Starting retail backend integration service"
    );

    let metrics = match MetricsService::new() {
        Ok(service) => Some(service),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let integrator = Arc::new(BackendIntegrator::from_config(&config)?);

    if config.health_check.monitor_enabled {
        integrator
            .health()
            .clone()
            .spawn_monitor(config.health_check.interval());
    }

    let app = api::router(AppState {
        integrator,
        metrics,
    });

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(IntegrationError::Io)?;

    info!(address = %addr, "Integration service ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| IntegrationError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retail_integration=debug,tower_http=debug".into()),
        )
        .with_target(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
