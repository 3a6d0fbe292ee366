//! Logging setup.
//!
//! The library itself only emits `tracing` events. This module builds the
//! subscriber a binary installs (a plain-text log file plus warnings on
//! stderr) and defines [`LogSink`], the handle through which the download
//! engine is told where its events go.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::dispatcher::{self, Dispatch, SetGlobalDefaultError};
use tracing::subscriber::NoSubscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "demtiles.log";

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Errors from setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("no log directory configured and no cache directory available")]
    NoDirectory,

    #[error("failed to create log directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("invalid log filter '{0}'")]
    Filter(String),

    #[error("a global logger is already installed")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory of the log file. `None` means the platform cache directory.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// Filter used when `RUST_LOG` is unset or ignored.
    pub default_filter: String,
    /// Whether `RUST_LOG` overrides `default_filter`.
    pub respect_env: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: DEFAULT_LOG_FILE.to_string(),
            default_filter: DEFAULT_FILTER.to_string(),
            respect_env: true,
        }
    }
}

impl LogConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_respect_env(mut self, respect_env: bool) -> Self {
        self.respect_env = respect_env;
        self
    }

    /// Resolved log directory: the configured one, else `<cache>/demtiles`.
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("demtiles")))
    }

    /// Full path of the log file.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_directory().map(|dir| dir.join(&self.file_name))
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if self.respect_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.default_filter)
            .map_err(|_| LoggingError::Filter(self.default_filter.clone()))
    }
}

/// Keeps the background log writer alive. Dropping it flushes the file.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Build a dispatcher that logs to the configured file and warns on stderr.
pub fn build_dispatch(config: &LogConfig) -> Result<(Dispatch, LoggingGuard), LoggingError> {
    let directory = config.log_directory().ok_or(LoggingError::NoDirectory)?;
    std::fs::create_dir_all(&directory).map_err(|source| LoggingError::Directory {
        path: directory.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&config.file_name)
        .build(&directory)?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry()
        .with(config.filter()?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .compact()
                .with_filter(LevelFilter::WARN),
        );

    Ok((Dispatch::new(subscriber), LoggingGuard { _worker: worker }))
}

/// Install the configured dispatcher as the process-wide default.
pub fn init(config: &LogConfig) -> Result<LoggingGuard, LoggingError> {
    let (dispatch, guard) = build_dispatch(config)?;
    dispatcher::set_global_default(dispatch)?;
    Ok(guard)
}

/// Destination for the events a download job emits.
///
/// The engine runs each job inside [`in_scope`](Self::in_scope), so events
/// from the worker thread reach this sink regardless of which subscriber
/// that thread would otherwise see.
#[derive(Clone, Debug)]
pub struct LogSink {
    dispatch: Dispatch,
}

impl LogSink {
    /// The dispatcher active on the calling thread.
    pub fn current() -> Self {
        Self {
            dispatch: dispatcher::get_default(|dispatch| dispatch.clone()),
        }
    }

    /// Discard all events.
    pub fn none() -> Self {
        Self {
            dispatch: Dispatch::new(NoSubscriber::default()),
        }
    }

    /// Run `f` with this sink as the thread's default dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::current()
    }
}

impl From<Dispatch> for LogSink {
    fn from(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }
}
