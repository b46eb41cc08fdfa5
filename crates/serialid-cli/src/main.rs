#![doc = include_str!("../README.md")]

mod app;

use app::commands;
use app::config::{AppConfig, CliArgs};
use app::telemetry::init_telemetry;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry(config.log_json)?;
    log_startup_info(&config);

    let stdout = std::io::stdout();
    commands::run(config, &mut stdout.lock())
}

fn log_startup_info(config: &AppConfig) {
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database.display(),
        scheme = %config.allocator.scheme,
        max_batch = config.allocator.max_batch,
        retry_attempts = config.allocator.retry.max_attempts,
        principal = config.principal.as_ref().map(|p| p.as_str()),
        "serialid starting"
    );
}
