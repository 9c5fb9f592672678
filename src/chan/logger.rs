//! Per-run log file.
//!
//! Nothing here installs a global subscriber. A [`LogContext`] owns a
//! [`Dispatch`] that callers attach to the futures they run, so a disabled
//! context simply swallows every event.

use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoLocal};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Timestamp format used for log file names.
const LOG_FILE_STAMP: &str = "%Y-%m-%d_%H.%M.%S";

#[derive(Error, Debug)]
pub(crate) enum LoggerError {
    #[error("Error creating log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error creating log file: {0}")]
    Appender(String),

    #[error("Invalid log level \"{level}\": {reason}")]
    Filter { level: String, reason: String },
}

pub(crate) type LoggerResult<T> = Result<T, LoggerError>;

/// Logging handle passed explicitly to whatever needs to emit events.
pub(crate) struct LogContext {
    dispatch: Dispatch,
    path: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LogContext {
    /// Opens `{log_dir}/{timestamp}.log` and routes events at `level` or above into it.
    pub(crate) fn to_file(log_dir: &Path, level: &str) -> LoggerResult<Self> {
        create_dir_all(log_dir).map_err(|source| LoggerError::Directory {
            path: log_dir.to_path_buf(),
            source,
        })?;

        let stem = Local::now().format(LOG_FILE_STAMP).to_string();
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(&stem)
            .filename_suffix("log")
            .build(log_dir)
            .map_err(|e| LoggerError::Appender(e.to_string()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let filter = EnvFilter::try_new(format!("{}={}", env!("CARGO_CRATE_NAME"), level.trim()))
            .map_err(|e| LoggerError::Filter {
                level: level.to_string(),
                reason: e.to_string(),
            })?;

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(ChronoLocal::rfc_3339())
                .with_file(true)
                .with_line_number(true)
                .with_target(false),
        );

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            path: Some(log_dir.join(format!("{}.log", stem))),
            _guard: Some(guard),
        })
    }

    /// A context that discards every event.
    pub(crate) fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
            path: None,
            _guard: None,
        }
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Location of the log file, if one is being written.
    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{read_dir, read_to_string};
    use tempfile::TempDir;
    use tracing::{debug, info};

    #[test]
    fn test_file_context_writes_events() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        let context = LogContext::to_file(&log_dir, "debug").unwrap();
        let path = context.path().unwrap().to_path_buf();
        tracing::dispatcher::with_default(context.dispatch(), || {
            info!("hello from the test");
            debug!("Skipping: [{}]; not a file.", 3);
        });
        // dropping the guard flushes the non-blocking writer
        drop(context);

        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
        let contents = read_to_string(&path).unwrap();
        assert!(contents.contains("hello from the test"));
        assert!(contents.contains("Skipping: [3]; not a file."));
        assert!(contents.contains("INFO"));
    }

    #[test]
    fn test_level_filter_is_applied() {
        let temp_dir = TempDir::new().unwrap();
        let context = LogContext::to_file(temp_dir.path(), "info").unwrap();
        let path = context.path().unwrap().to_path_buf();
        tracing::dispatcher::with_default(context.dispatch(), || {
            debug!("quiet detail");
            info!("loud summary");
        });
        drop(context);

        let contents = read_to_string(&path).unwrap();
        assert!(contents.contains("loud summary"));
        assert!(!contents.contains("quiet detail"));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            LogContext::to_file(temp_dir.path(), "loudest"),
            Err(LoggerError::Filter { .. })
        ));
    }

    #[test]
    fn test_disabled_context_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let context = LogContext::disabled();
        tracing::dispatcher::with_default(context.dispatch(), || {
            info!("nobody hears this");
        });

        assert!(context.path().is_none());
        assert_eq!(read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
