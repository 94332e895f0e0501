use std::path::PathBuf;
use thiserror::Error;

/// Fatal synchronization errors
///
/// Anything returned through this type aborts the run. Per-entry anomalies
/// that the run recovers from are reported as
/// [`EntryStatus`](crate::synchronizer::EntryStatus) values instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Mapping file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read mapping file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid mapping file: {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to copy {src} to {dst}")]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read or apply metadata for {path}")]
    MetadataFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {root}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{src} and {dst} are the same file")]
    SameFile { src: PathBuf, dst: PathBuf },

    #[error("Cannot copy {src} into its own subdirectory {dst}")]
    DestinationInsideSource { src: PathBuf, dst: PathBuf },

    #[error("Failed to initialize logging: {message}")]
    LogInit { message: String },
}

impl SyncError {
    /// True for errors raised while loading the mapping, before any copy starts
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::ConfigNotFound { .. }
                | SyncError::ConfigRead { .. }
                | SyncError::ConfigParse { .. }
        )
    }
}

/// ENOSPC on Unix, ERROR_DISK_FULL on Windows
pub(crate) fn is_disk_full(err: &std::io::Error) -> bool {
    #[cfg(windows)]
    const DISK_FULL: i32 = 112;
    #[cfg(not(windows))]
    const DISK_FULL: i32 = 28;

    err.raw_os_error() == Some(DISK_FULL)
}
