//! Logging initializer: compact stderr output, plus a plain log file if asked.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Name of the log file created inside the log directory.
pub const LOG_FILE: &str = "app.log";

/// Filters come from `RUST_LOG`, `info` if unset.
pub fn init_logging(log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    // Append-only, never rolled.
    let file = log_dir.map(|dir| {
        let appender = tracing_appender::rolling::never(dir, LOG_FILE);
        fmt::layer().with_ansi(false).with_writer(appender)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
}
