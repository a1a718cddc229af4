//! Tracing initialization
//!
//! Log verbosity comes from `RUST_LOG`; without it the Docshare crates log at
//! `debug` together with the HTTP tracing layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "docshare=debug,tower_http=debug";

/// Initialize tracing once for the process.
///
/// Production environments emit JSON lines; everything else uses the compact
/// human-readable formatter.
pub fn init_telemetry(
    service_name: &str,
    service_version: &str,
    environment: &str,
) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = matches!(environment.to_lowercase().as_str(), "production" | "prod");

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!(
        service = %service_name,
        version = %service_version,
        environment = %environment,
        "Tracing initialized"
    );
    Ok(())
}
