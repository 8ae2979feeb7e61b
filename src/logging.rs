use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "restock-watcher.log";

/// Install the global subscriber: console output plus, when a directory is
/// configured, a daily-rolling JSON file.
///
/// `RUST_LOG` overrides the configured level. The returned guard must be held
/// for the life of the process or buffered file output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };

    let console = if config.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let (file, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

/// Our own crate at `level`, everything else at warn.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::try_new(format!("restock_watcher={},warn", level))?)
}
