//! # Filemap Sync
//!
//! Copies files and directory trees from arbitrary locations into a
//! structured destination tree described by a JSON mapping.
//!
//! ## Features
//!
//! - Nested categories of any depth, created lazily as directories
//! - File copies that preserve permissions and timestamps
//! - Directory merge-copy that keeps destination-only files
//! - Per-entry outcomes: missing sources and type conflicts are skipped,
//!   unexpected I/O errors abort the run
//!
//! ## Usage
//!
//! ```ignore
//! use filemap_sync::mapping::load_mapping;
//! use filemap_sync::synchronizer::{synchronize, SyncOptions};
//!
//! let tree = load_mapping(Path::new("filemap.json"))?;
//! let report = synchronize(&tree, Path::new("."), &SyncOptions::default())?;
//! ```

/// CLI configuration and argument parsing
pub mod config;

/// File copy and directory merge operations
pub mod copier;

/// Error types for sync operations
pub mod error;

/// Console and size-rotating file logging
pub mod logging;

/// Mapping file types and loading
pub mod mapping;

/// Mapping tree traversal
pub mod synchronizer;
