//! CLI configuration and runtime settings for a sync run.

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::logging::LogSettings;
use crate::synchronizer::SyncOptions;

/// Default mapping file name, looked up next to the executable
pub const DEFAULT_MAPPING_FILE: &str = "filemap.json";

/// Name of the log directory created next to the mapping file
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Copy files and directories into a structured tree described by a JSON mapping
#[derive(Parser, Debug)]
#[command(name = "filemap-sync")]
#[command(version)]
#[command(about = "Copy files and directories into a structured tree described by a JSON mapping")]
pub struct Cli {
    /// Mapping file (default: filemap.json next to the executable)
    pub mapping: Option<PathBuf>,

    /// Destination root (default: the mapping file's directory)
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Directory for log files (default: logs/ next to the mapping file)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log to the console only
    #[arg(long)]
    pub no_log_file: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runtime configuration parsed from CLI
#[derive(Debug, Clone)]
pub struct Config {
    /// Mapping file to load
    pub mapping_path: PathBuf,
    /// Root the mapping is synchronized into
    pub destination_root: PathBuf,
    /// Base directory for relative source paths
    pub source_base: PathBuf,
    /// Log file directory (None = console only)
    pub log_dir: Option<PathBuf>,
    /// Enable verbose output
    pub verbose: bool,
}

impl Config {
    /// Create Config from CLI arguments
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mapping_path = match cli.mapping {
            Some(path) => path,
            None => default_mapping_path()?,
        };
        let mapping_path = absolutize(&mapping_path)?;

        let mapping_dir = mapping_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let destination_root = match cli.dest {
            Some(dest) => absolutize(&dest)?,
            None => mapping_dir.clone(),
        };

        let log_dir = if cli.no_log_file {
            None
        } else {
            Some(match cli.log_dir {
                Some(dir) => absolutize(&dir)?,
                None => mapping_dir.join(DEFAULT_LOG_DIR),
            })
        };

        Ok(Config {
            mapping_path,
            destination_root,
            source_base: mapping_dir,
            log_dir,
            verbose: cli.verbose,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            source_base: self.source_base.clone(),
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            log_dir: self.log_dir.clone(),
            verbose: self.verbose,
        }
    }
}

/// `filemap.json` in the directory holding the running executable
fn default_mapping_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(DEFAULT_MAPPING_FILE))
}

/// Canonicalize when the path exists, otherwise join onto the working directory
fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
