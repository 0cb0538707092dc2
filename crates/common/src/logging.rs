//! Logging and tracing initialization.

use std::fs::File;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. When a log file
/// is configured and can be opened, output goes there instead of stderr.
/// A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true);

    match (config.json, open_log_file(config)) {
        (true, Some(file)) => install(builder.json().with_writer(Mutex::new(file)).finish()),
        (true, None) => install(builder.json().finish()),
        (false, Some(file)) => install(
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish(),
        ),
        (false, None) => install(builder.with_file(false).with_line_number(false).finish()),
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn open_log_file(config: &LoggingConfig) -> Option<File> {
    let path = config.file.as_ref()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eprintln!("Failed to open log file {}: {e}", path.display()))
        .ok()
}

fn install<S>(subscriber: S)
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber).ok();
}
