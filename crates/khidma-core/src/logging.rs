use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::{LocalTime, UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::config_directory;

pub const LOG_ENV: &str = "KHIDMA_LOG";
const LOG_FILE_NAME: &str = "khidma.log";
const DEFAULT_DIRECTIVE: &str = "info";

/// Controls where structured logs are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingDestination {
    /// Only the persistent JSON log file. Keeps command output clean.
    File,
    /// The log file plus human-readable lines on stderr.
    FileAndStderr,
}

#[derive(Debug)]
struct LoggingGuards {
    _guard: WorkerGuard,
    log_path: PathBuf,
}

static LOGGING_STATE: OnceLock<LoggingGuards> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] io::Error),
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global structured logging subscriber.
///
/// The first call wins; later calls are no-ops that return the same log file path.
pub fn init_logging(destination: LoggingDestination) -> Result<&'static PathBuf, LoggingError> {
    if LOGGING_STATE.get().is_none() {
        let guards = install_logging(destination)?;
        if let Err(guards) = LOGGING_STATE.set(guards) {
            drop(guards);
        }
    }

    current_log_path().ok_or_else(|| {
        LoggingError::Io(io::Error::other("logging state missing after initialization"))
    })
}

pub fn current_log_path() -> Option<&'static PathBuf> {
    LOGGING_STATE.get().map(|guards| &guards.log_path)
}

pub fn log_directory() -> PathBuf {
    config_directory().join("logs")
}

fn install_logging(destination: LoggingDestination) -> Result<LoggingGuards, LoggingError> {
    let filter = EnvFilter::try_new(filter_directive(
        env::var(LOG_ENV).ok(),
        env::var("RUST_LOG").ok(),
    ))?;

    let dir = log_directory();
    fs::create_dir_all(&dir)?;
    let log_path = dir.join(LOG_FILE_NAME);
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, LOG_FILE_NAME));

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(
            tracing_subscriber::fmt::format()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_level(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with_writer(writer)
        .with_ansi(false)
        .boxed();

    let stderr_layer = match destination {
        LoggingDestination::FileAndStderr => Some(
            tracing_subscriber::fmt::layer()
                .event_format(
                    tracing_subscriber::fmt::format()
                        .with_timer(LocalTime::rfc_3339())
                        .with_level(true)
                        .with_target(true)
                        .with_ansi(false),
                )
                .with_writer(io::stderr)
                .with_ansi(false)
                .boxed(),
        ),
        LoggingDestination::File => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    info!(path = %log_path.display(), "Structured logging enabled");

    Ok(LoggingGuards {
        _guard: guard,
        log_path,
    })
}

/// `KHIDMA_LOG` wins over `RUST_LOG`; blank values are ignored.
fn filter_directive(app: Option<String>, rust_log: Option<String>) -> String {
    [app, rust_log]
        .into_iter()
        .flatten()
        .find(|spec| !spec.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_variable_takes_precedence() {
        assert_eq!(
            filter_directive(Some("debug".into()), Some("warn".into())),
            "debug"
        );
        assert_eq!(
            filter_directive(Some("  ".into()), Some("warn".into())),
            "warn"
        );
        assert_eq!(filter_directive(None, None), "info");
    }

    #[test]
    fn log_file_lives_under_config_directory() {
        assert!(log_directory().starts_with(config_directory()));
        assert!(log_directory().ends_with("logs"));
    }
}
