//! Logging setup.
//!
//! A run logs to the console (stderr) and, unless disabled, to
//! `sync_files.log` in the log directory. The file rotates once it reaches
//! [`MAX_LOG_BYTES`], keeping [`LOG_BACKUP_COUNT`] numbered backups
//! (`sync_files.log.1` is the newest). `RUST_LOG` overrides the level.

use std::path::{Path, PathBuf};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing::Dispatch;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::copier::ensure_dir;
use crate::error::SyncError;

/// Name of the active log file
pub const LOG_FILE_NAME: &str = "sync_files.log";

/// Size at which the active log file is rotated
pub const MAX_LOG_BYTES: usize = 1_048_576;

/// Number of rotated backups kept next to the active file
pub const LOG_BACKUP_COUNT: usize = 5;

/// Where and how verbosely to log
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Directory for the rotating log file (None = console only)
    pub log_dir: Option<PathBuf>,
    /// Log at debug level instead of info
    pub verbose: bool,
}

/// Keeps the file writer alive; buffered lines are flushed when dropped
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Size-bounded log file writer in `dir`
pub fn rotating_writer(dir: &Path, max_bytes: usize) -> FileRotate<AppendCount> {
    FileRotate::new(
        dir.join(LOG_FILE_NAME),
        AppendCount::new(LOG_BACKUP_COUNT),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

/// Build the console + file dispatcher without installing it
pub fn build_dispatch(settings: &LogSettings) -> Result<(Dispatch, LogGuard), SyncError> {
    let default_level = if settings.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file, guard) = match &settings.log_dir {
        Some(dir) => {
            ensure_dir(dir)?;
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .finish(rotating_writer(dir, MAX_LOG_BYTES));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file);

    Ok((Dispatch::new(subscriber), LogGuard { _worker: guard }))
}

/// Install the process-wide logger. Call once, before synchronizing, and
/// hold the returned guard until the run ends.
pub fn init(settings: &LogSettings) -> Result<LogGuard, SyncError> {
    let (dispatch, guard) = build_dispatch(settings)?;
    tracing::dispatcher::set_global_default(dispatch).map_err(|e| SyncError::LogInit {
        message: e.to_string(),
    })?;
    Ok(guard)
}
