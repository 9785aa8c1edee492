//! FOMO Scanner - background crypto discovery service.
//!
//! Refreshes a ranked list of early-momentum assets every few minutes and
//! serves it over HTTP.

use anyhow::{Context, Result};
use fomo_common::config::{config_path, Config};
use fomo_common::logging::init_logging_with_exclusions;
use fomo_scanner::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let mut config = Config::load()?;
    let ignored_overrides = config.apply_env_overrides();

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("FOMO Scanner v{}", env!("CARGO_PKG_VERSION"));

    let path = config_path();
    if path.exists() {
        tracing::info!(path = %path.display(), "Loaded config file");
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
    }
    for var in ignored_overrides {
        tracing::warn!(var, "Ignoring invalid environment override");
    }

    config.validate().context("Invalid configuration")?;

    let service = ScannerService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutdown requested");
        })
        .await
}
