//! Pulse Dashboard - market sentiment dashboard service.
//!
//! Serves baskets, reconciled sentiment signals, and performance views over
//! an authenticated JSON API.

use anyhow::Result;
use pulse_common::config::Config;
use pulse_common::logging::init_logging_with_exclusions;
use pulse_common::ResultExt;
use pulse_dashboard::DashboardService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Pulse Dashboard v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate().context("Refusing to start") {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let service = DashboardService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
