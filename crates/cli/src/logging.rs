//! Logging setup
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `workbench=info`)
//! - `OIS_LOG_FORMAT`: `pretty` (default) or `json`
//! - `OIS_LOG_DIR`: also write daily-rotated JSON logs to this directory

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "workbench=info,workbench_core=info,workbench_infra_system=info";
const LOG_FILE_PREFIX: &str = "ois-workbench.log";

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. Keep the returned guard alive until exit, it flushes
/// the file writer.
pub fn init() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("OIS_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let console = match log_format.as_str() {
        // Production: JSON structured logging
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        // Development: Pretty formatting with colors
        _ => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    };

    let (file, guard) = match std::env::var("OIS_LOG_DIR") {
        Ok(dir) => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
