//! Logging setup for CLI commands and the daemon

use silauto::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "silauto.log";

/// Initialize logging for one-shot commands (stderr only)
pub fn init_cli_logging(level: &str) {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter(level))
    .with_writer(std::io::stderr)
    .init();
}

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// RUST_LOG overrides the configured level
fn env_filter(level: &str) -> EnvFilter {
  EnvFilter::builder()
    .with_default_directive(parse_log_level(level).into())
    .from_env_lossy()
}

/// Initialize daemon logging.
///
/// With a log directory configured, logs go to a rolling file only (no ANSI).
/// Otherwise they go to the console.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_daemon_logging(config: &LogConfig) -> Option<WorkerGuard> {
  let Some(log_dir) = &config.directory else {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter(&config.level))
      .with_target(true)
      .with_ansi(true)
      .init();
    return None;
  };

  if std::fs::create_dir_all(log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging(&config.level);
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(log_dir, LOG_FILE),
    "never" => tracing_appender::rolling::never(log_dir, LOG_FILE),
    _ => tracing_appender::rolling::daily(log_dir, LOG_FILE),
  };

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(&config.level))
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
