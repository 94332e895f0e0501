//! Mapping tree synchronization.
//!
//! Walks a [`MappingTree`] depth-first and materializes it under a
//! destination root:
//! - categories become directories (created only when visited)
//! - file sources are copied with their metadata
//! - directory sources are merge-copied into the destination
//!
//! Recoverable per-entry anomalies are logged and recorded in the
//! [`SyncReport`]. Any other I/O failure aborts the traversal and is
//! returned as a [`SyncError`].

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::copier::{copy_directory, copy_file, ensure_dir};
use crate::error::SyncError;
use crate::mapping::{MappingTree, TreeNode};

/// Options controlling how leaf sources are resolved
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Base for relative source paths
    pub source_base: PathBuf,
}

/// What was copied for a leaf entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    File { bytes: u64 },
    Directory { files: u64, bytes: u64 },
}

/// Why a leaf entry was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source path does not exist
    SourceNotFound,
    /// The source exists but is neither a regular file nor a directory
    UnsupportedSourceType,
    /// The mapping value is neither a nested mapping nor a string
    InvalidMappingValue(&'static str),
}

/// Source and destination have incompatible types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    DirectoryOverFile,
    FileOverDirectory,
}

/// Outcome of a single leaf entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Copied(CopyKind),
    Skipped(SkipReason),
    Conflict(ConflictReason),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SourceNotFound => write!(f, "source not found"),
            SkipReason::UnsupportedSourceType => {
                write!(f, "source is neither a file nor a directory")
            }
            SkipReason::InvalidMappingValue(kind) => {
                write!(f, "mapping value is a {kind}, expected a mapping or a path")
            }
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::DirectoryOverFile => {
                write!(f, "cannot copy a directory over an existing file")
            }
            ConflictReason::FileOverDirectory => {
                write!(f, "cannot copy a file over an existing directory")
            }
        }
    }
}

/// Result of processing one leaf entry
#[derive(Debug, Clone)]
pub struct EntryResult {
    /// Resolved source path (None when the mapping value was not a path)
    pub source: Option<PathBuf>,
    /// Destination the entry maps to
    pub destination: PathBuf,
    pub status: EntryStatus,
}

/// Aggregated counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub directories_merged: u64,
    pub skipped: u64,
    pub conflicts: u64,
}

/// Per-entry outcomes of a completed run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<EntryResult>,
    pub stats: SyncStats,
}

impl SyncReport {
    fn record(&mut self, result: EntryResult) {
        match &result.status {
            EntryStatus::Copied(CopyKind::File { bytes }) => {
                self.stats.files_copied += 1;
                self.stats.bytes_copied += bytes;
            }
            EntryStatus::Copied(CopyKind::Directory { files, bytes }) => {
                self.stats.directories_merged += 1;
                self.stats.files_copied += files;
                self.stats.bytes_copied += bytes;
            }
            EntryStatus::Skipped(_) => self.stats.skipped += 1,
            EntryStatus::Conflict(_) => self.stats.conflicts += 1,
        }
        self.entries.push(result);
    }

    /// Find the outcome recorded for a destination path
    pub fn entry_for(&self, destination: &Path) -> Option<&EntryResult> {
        self.entries.iter().find(|e| e.destination == destination)
    }

    /// True when every entry was copied
    pub fn is_clean(&self) -> bool {
        self.stats.skipped == 0 && self.stats.conflicts == 0
    }
}

/// Resolve a mapping source string to a filesystem path
///
/// `~` expands to the home directory, relative paths are joined onto
/// `source_base`, absolute paths are returned unchanged.
pub fn resolve_source(raw: &str, source_base: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') {
            if let Some(home) = home_dir() {
                return home.join(rest.trim_start_matches(['/', '\\']));
            }
        }
    }

    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        source_base.join(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Synchronize a whole mapping tree into `destination_root`
///
/// Each top-level key becomes a directory under the root; its children are
/// processed recursively with [`process_entry`].
pub fn synchronize(
    tree: &MappingTree,
    destination_root: &Path,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    for (category, node) in tree {
        let category_dir = destination_root.join(category);

        let TreeNode::Category(entries) = node else {
            tracing::warn!(
                "Category {category} is a {}, expected a mapping; skipping",
                node.kind()
            );
            report.record(EntryResult {
                source: None,
                destination: category_dir,
                status: EntryStatus::Skipped(SkipReason::InvalidMappingValue(node.kind())),
            });
            continue;
        };

        ensure_dir(&category_dir)?;

        for (name, value) in entries {
            tracing::info!("Processing {name} in {category}");
            process_entry(&category_dir, name, value, options, &mut report)?;
        }
    }

    Ok(report)
}

/// Process one mapping entry under `base_dir`
///
/// Nested mappings become subdirectories and are recursed into; leaves are
/// copied according to the type of the source and the destination.
pub fn process_entry(
    base_dir: &Path,
    name: &str,
    node: &TreeNode,
    options: &SyncOptions,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    match node {
        TreeNode::Category(entries) => {
            let current_dir = base_dir.join(name);
            ensure_dir(&current_dir)?;

            for (sub_name, sub_node) in entries {
                tracing::info!("Processing {sub_name} in {}", current_dir.display());
                process_entry(&current_dir, sub_name, sub_node, options, report)?;
            }
            Ok(())
        }
        TreeNode::Source(raw) => {
            let source = resolve_source(raw, &options.source_base);
            let destination = base_dir.join(name);

            let status = sync_leaf(&source, &destination).map_err(|e| {
                tracing::error!("Error processing {}: {e}", source.display());
                e
            })?;

            report.record(EntryResult {
                source: Some(source),
                destination,
                status,
            });
            Ok(())
        }
        TreeNode::Unsupported(_) => {
            let destination = base_dir.join(name);
            tracing::warn!(
                "Entry {} is a {}, expected a mapping or a path; skipping",
                destination.display(),
                node.kind()
            );
            report.record(EntryResult {
                source: None,
                destination,
                status: EntryStatus::Skipped(SkipReason::InvalidMappingValue(node.kind())),
            });
            Ok(())
        }
    }
}

/// Copy a single resolved source to its destination
fn sync_leaf(source: &Path, destination: &Path) -> Result<EntryStatus, SyncError> {
    let source_meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(e) if is_missing(&e) => {
            tracing::warn!("Source {} not found", source.display());
            return Ok(EntryStatus::Skipped(SkipReason::SourceNotFound));
        }
        Err(e) => {
            return Err(SyncError::MetadataFailed {
                path: source.to_path_buf(),
                source: e,
            })
        }
    };

    if source_meta.is_file() {
        if destination.is_dir() {
            tracing::error!(
                "Cannot copy file {} to {} which is a directory.",
                source.display(),
                destination.display()
            );
            return Ok(EntryStatus::Conflict(ConflictReason::FileOverDirectory));
        }

        let bytes = copy_file(source, destination)?;
        tracing::info!(
            "Copied file {} to {}",
            source.display(),
            destination.display()
        );
        Ok(EntryStatus::Copied(CopyKind::File { bytes }))
    } else if source_meta.is_dir() {
        if destination.is_file() {
            tracing::error!(
                "Cannot copy directory {} to {} which is a file.",
                source.display(),
                destination.display()
            );
            return Ok(EntryStatus::Conflict(ConflictReason::DirectoryOverFile));
        }

        let (files, bytes) = copy_directory(source, destination)?;
        tracing::info!(
            "Copied directory {} to {} ({files} files)",
            source.display(),
            destination.display()
        );
        Ok(EntryStatus::Copied(CopyKind::Directory { files, bytes }))
    } else {
        tracing::warn!(
            "Source {} is neither a file nor a directory",
            source.display()
        );
        Ok(EntryStatus::Skipped(SkipReason::UnsupportedSourceType))
    }
}

/// Errors that mean "nothing is there" rather than "could not look"
fn is_missing(err: &std::io::Error) -> bool {
    // ENOTDIR: a path component is a regular file
    #[cfg(unix)]
    const NOT_A_DIRECTORY: Option<i32> = Some(20);
    #[cfg(not(unix))]
    const NOT_A_DIRECTORY: Option<i32> = None;

    err.kind() == ErrorKind::NotFound
        || (NOT_A_DIRECTORY.is_some() && err.raw_os_error() == NOT_A_DIRECTORY)
}
