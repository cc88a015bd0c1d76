//! Tracing setup: human-readable stderr output plus a daily-rotated file
//! under the state directory.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init(debug: bool) -> Result<WorkerGuard> {
    let log_dir = snipe_config::state_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "snipe.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_target(false)
                .with_ansi(false),
        )
        .try_init()
        .ok();

    Ok(guard)
}
