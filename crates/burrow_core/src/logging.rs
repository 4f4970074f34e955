//! Structured logging setup with console and file output.
//!
//! Provides:
//! - Daily rotating log files under `<data_dir>/logs`
//! - Build-type conditional log levels
//! - Console-only output on an interactive terminal, and as a fallback when file
//!   logging fails
//! - Environment variable override via BURROW_LOG or RUST_LOG
//!
//! Console output goes to stderr so it never mixes with command output on stdout.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "BURROW_LOG";

/// Logging configuration.
pub struct LogConfig {
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Whether stderr is an interactive terminal
    pub is_tty: bool,
    /// Optional custom log filter
    pub log_filter: Option<String>,
}

impl LogConfig {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir, is_tty: atty::is(atty::Stream::Stderr), log_filter: None }
    }

    /// Set custom log filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Guard that must be held for the lifetime of the process.
///
/// Dropping this guard flushes pending log entries.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Initialize logging. A subscriber that is already installed is left in place.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    if config.is_tty {
        return init_console_logging(config.log_filter.as_deref());
    }

    match init_file_logging(&config) {
        Ok(guard) => LoggingGuard { _worker_guard: Some(guard) },
        Err(e) => {
            eprintln!("Warning: Failed to initialize file logging: {e}. Using console only.");
            init_console_logging(config.log_filter.as_deref())
        }
    }
}

/// Initialize with the default log directory.
pub fn init_logging_default() -> LoggingGuard {
    init_logging(LogConfig::new(log_dir()))
}

fn init_console_logging(filter: Option<&str>) -> LoggingGuard {
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_env_filter(filter))
        .with_ansi(true)
        .with_target(false)
        .try_init();
    if let Err(e) = installed {
        tracing::debug!(error = %e, "Keeping previously installed subscriber");
    }

    LoggingGuard { _worker_guard: None }
}

type SetupError = Box<dyn std::error::Error + Send + Sync>;

fn init_file_logging(config: &LogConfig) -> Result<WorkerGuard, SetupError> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("burrow")
        .filename_suffix("log")
        .build(&config.log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console = std::io::stderr.with_max_level(tracing::Level::WARN);

    tracing_subscriber::fmt()
        .with_writer(console.and(non_blocking))
        .with_env_filter(build_env_filter(config.log_filter.as_deref()))
        .with_ansi(false)
        .with_target(true)
        .try_init()?;

    Ok(guard)
}

/// Priority: custom filter > BURROW_LOG > RUST_LOG > build default.
fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Default log filter for the build type.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "info,burrow=debug,burrow_core=debug,tokio_postgres=warn"
    }
    #[cfg(not(debug_assertions))]
    {
        "warn,burrow=info,burrow_core=info,tokio_postgres=warn"
    }
}

/// Default log directory.
pub fn log_dir() -> PathBuf {
    crate::services::storage::default_data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_then_reinit_keeps_first_subscriber() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LogConfig { log_dir: dir.path().join("logs"), is_tty: false, log_filter: None };

        let _first = init_logging(config);
        assert!(dir.path().join("logs").is_dir());

        // A second install fails inside try_init and falls back without panicking.
        let again = LogConfig { log_dir: dir.path().join("logs"), is_tty: false, log_filter: None };
        let _second = init_logging(again);
        let _console = init_logging(LogConfig { is_tty: true, ..LogConfig::new(dir.path().into()) });
    }

    #[test]
    fn test_custom_filter_wins() {
        let filter = build_env_filter(Some("burrow_core=trace"));
        assert_eq!(filter.to_string(), "burrow_core=trace");
    }
}
