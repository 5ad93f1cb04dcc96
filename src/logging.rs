// Tracing setup
//
// stderr always, plus an optional append-only file. The file writer sits
// behind a Mutex so lines from concurrent requests never interleave.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Open (creating if needed) a log file for appending
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Filter from RUST_LOG, else the configured level, else info
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. `try_init` also routes `log` records
/// (tokenizers, ort) into tracing.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = &config.file {
        tracing::debug!(file = %path.display(), "Logging to file");
    }
    Ok(())
}
