//! # GDELT Hydrator
//!
//! Command-line entry point.
//!
//! ## Usage
//!
//! ```sh
//! gdelt_hydrator hydrate --start 2020-12-01 --end 2020-12-31 -c config.yaml
//! gdelt_hydrator correct --start 2020-12-01 --end 2020-12-31 -c config.yaml
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use clap::Parser;
use gdelt_hydrator::cli::{Cli, Command};
use gdelt_hydrator::config::HydrateConfig;
use gdelt_hydrator::correct;
use gdelt_hydrator::driver::Driver;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("gdelt_hydrator starting up");

    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    let mut config = HydrateConfig::load(args.command.config_path().map(|p| p.as_path())).await?;
    args.command.apply_overrides(&mut config);
    let (start, end) = args.command.range();

    match args.command {
        Command::Hydrate { .. } => {
            let driver = Driver::new(config)?;
            let summary = driver.run(start, end).await?;
            let tally = summary.tally();
            info!(
                days = summary.days.len(),
                rows = summary.rows(),
                extracted = tally.extracted,
                recovered_by_fallback = tally.recovered,
                unreachable = tally.unreachable,
                failed = tally.failed,
                "Hydration finished"
            );
        }
        Command::Correct { .. } => {
            let summary = correct::run(&config, start, end).await?;
            if !summary.failed.is_empty() {
                error!(days = ?summary.failed, "Some days could not be corrected");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
