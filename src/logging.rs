//! Initialisation du logging.
//!
//! One global `tracing` subscriber, installed once from `main`:
//!
//! - **Filter**: `RUST_LOG` when set, else `logging.filter` from the config.
//!   An invalid directive falls back to `info`.
//! - **Writer**: a `tracing-appender` non-blocking writer, over a daily
//!   rolling file when `logging.directory` is set, over stderr otherwise.
//!   Log calls on the UI thread only enqueue; a worker thread does the I/O.
//!   A directory that cannot be created falls back to stderr with a warning.
//!
//! The returned [`WorkerGuard`] must live until the end of `main`, dropping
//! it flushes what is still queued.

use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

const FALLBACK_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "surikiosk.log";

/// Installs the global subscriber. Calling it twice keeps the first one.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(&config.filter, rust_log.as_deref());
    let (filter, rejected) = match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_FILTER), Some((directive.to_string(), e))),
    };

    let directory = config.directory.trim();
    let mut unusable_directory = None;
    let appender = if directory.is_empty() {
        None
    } else {
        match file_appender(Path::new(directory)) {
            Ok(appender) => Some(appender),
            Err(e) => {
                unusable_directory = Some((directory.to_string(), e));
                None
            }
        }
    };
    let file_logging = appender.is_some();
    let (writer, guard) = match appender {
        Some(appender) => tracing_appender::non_blocking(appender),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(!file_logging))
        .try_init()
        .is_ok();

    // Reported once a subscriber exists to receive it.
    if installed && let Some((directive, error)) = rejected {
        warn!(%directive, %error, "Invalid log filter, using \"info\"");
    }
    if installed && let Some((directory, error)) = unusable_directory {
        warn!(%directory, %error, "Cannot log to directory, using stderr");
    }
    guard
}

/// Daily rolling appender. Unlike `rolling::daily`, reports a directory it
/// cannot create instead of panicking.
fn file_appender(directory: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(directory)
}

/// `RUST_LOG` wins over the configured filter; blanks count as unset.
fn filter_directive<'a>(configured: &'a str, rust_log: Option<&'a str>) -> &'a str {
    [rust_log.unwrap_or(""), configured]
        .into_iter()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(FALLBACK_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(filter_directive("info", Some("surikiosk=debug")), "surikiosk=debug");
    }

    #[test]
    fn test_configured_filter_used_without_rust_log() {
        assert_eq!(filter_directive("warn", None), "warn");
        assert_eq!(filter_directive("warn", Some("  ")), "warn");
    }

    #[test]
    fn test_empty_everything_falls_back_to_info() {
        assert_eq!(filter_directive("", None), "info");
    }

    #[test]
    fn test_file_appender_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_appender(&dir.path().join("logs")).is_ok());
    }

    #[test]
    fn test_file_appender_under_regular_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(file_appender(&file.path().join("logs")).is_err());
    }

    #[test]
    fn test_unusable_directory_falls_back_without_panicking() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = LoggingConfig {
            filter: "info".to_string(),
            directory: file.path().join("logs").display().to_string(),
        };
        drop(init_logging(&config));
    }

    #[test]
    fn test_init_logging_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            filter: "debug".to_string(),
            directory: dir.path().display().to_string(),
        };
        let guard = init_logging(&config);
        tracing::info!("written through the non-blocking writer");
        drop(guard);
    }
}
