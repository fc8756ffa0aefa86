//! Logging setup
//!
//! `RUST_LOG` wins over the configured level when set.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with stdout output
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

/// Initialize the logger, writing to a daily rolling file when `log_dir` exists
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&Path>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_appender = log_dir
        .filter(|dir| dir.is_dir())
        .map(|dir| tracing_appender::rolling::daily(dir, "pos-sync"));

    // try_init: tests and embedders may already have a subscriber
    let result = match (file_appender, json) {
        (Some(appender), true) => builder.json().with_writer(appender).try_init(),
        (Some(appender), false) => builder.with_ansi(false).with_writer(appender).try_init(),
        (None, true) => builder.json().try_init(),
        (None, false) => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logger already initialized: {e}");
    }
}
