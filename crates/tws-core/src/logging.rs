//! Logging init: `tracing` events go to a file under the XDG state dir, or to
//! stderr when that file cannot be opened.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tws=debug,tws_core=debug";

/// Where log output ended up.
#[derive(Debug)]
pub enum LogTarget {
    File(PathBuf),
    /// The log file was unusable; the error says why.
    Stderr(anyhow::Error),
}

/// Install the global subscriber, writing to `~/.local/state/tws/tws.log`
/// and falling back to stderr. Errs only when no subscriber could be
/// installed (e.g. one is already set).
pub fn init_logging() -> Result<LogTarget> {
    match state_log_path().and_then(|path| open_log_file(&path).map(|file| (path, file))) {
        Ok((path, file)) => {
            install(BoxMakeWriter::new(Mutex::new(file)))?;
            tracing::info!("tws logging initialized at {}", path.display());
            Ok(LogTarget::File(path))
        }
        Err(err) => {
            install(BoxMakeWriter::new(io::stderr))?;
            tracing::warn!("file logging unavailable: {:#}", err);
            Ok(LogTarget::Stderr(err))
        }
    }
}

fn state_log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tws")?;
    Ok(xdg_dirs.place_state_file("tws.log")?)
}

fn open_log_file(path: &Path) -> Result<File> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

fn install(writer: BoxMakeWriter) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing subscriber: {}", e))
}
