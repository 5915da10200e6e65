use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging on stderr. `RUST_LOG` wins over the
/// configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::info!(json = config.json, "Pipulate telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span carrying the attributes shared by all operations on one instance
pub fn workflow_span(operation: &str, app: &str, pipeline_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        operation = operation,
        app = app,
        pipeline.id = pipeline_id,
        correlation.id = %generate_correlation_id(),
    )
}

pub fn shutdown_telemetry() {
    tracing::info!("Pipulate telemetry shutdown complete");
}
