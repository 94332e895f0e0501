use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use filemap_sync::config::{Cli, Config};
use filemap_sync::logging;
use filemap_sync::mapping::load_mapping;
use filemap_sync::synchronizer::synchronize;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;

    let _log_guard = logging::init(&config.log_settings()).context("Failed to set up logging")?;

    tracing::info!("Starting file sync");
    let start = Instant::now();

    let result = load_mapping(&config.mapping_path).and_then(|tree| {
        tracing::info!(
            "Loaded {} categories ({} entries) from {}",
            tree.len(),
            tree.leaf_count(),
            config.mapping_path.display()
        );
        synchronize(&tree, &config.destination_root, &config.sync_options())
    });

    let report = match result {
        Ok(report) => report,
        Err(e) if e.is_configuration() => {
            tracing::error!(
                "Error during sync: {:#}; nothing was copied",
                anyhow::Error::from(e)
            );
            return Ok(ExitCode::from(1));
        }
        Err(e) => {
            tracing::error!("Error during sync: {:#}", anyhow::Error::from(e));
            return Ok(ExitCode::from(1));
        }
    };

    let stats = report.stats;
    tracing::info!(
        "Copied {} files ({} bytes, {} directories merged) in {:.2}s; {} skipped, {} conflicts",
        stats.files_copied,
        stats.bytes_copied,
        stats.directories_merged,
        start.elapsed().as_secs_f64(),
        stats.skipped,
        stats.conflicts
    );
    tracing::info!("File sync completed successfully");

    Ok(ExitCode::SUCCESS)
}
