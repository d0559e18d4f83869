//! Tracing setup. The terminal belongs to the UI while the app runs, so
//! log lines go to a file instead of stdout.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing to a log file, honoring `RUST_LOG` for filtering.
/// Returns the path log lines are going to.
pub fn init_tracing(log_path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match log_path {
        Some(path) => path,
        None => default_log_path()?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)
        .with_context(|| format!("create log file {}", path.display()))?;

    let fmt_layer = fmt::layer()
        .with_writer(Arc::new(file))
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .compact();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::info!(target: "system", "logging to {}", path.display());
    Ok(path)
}

fn default_log_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("could not determine a log directory")?;
    Ok(dir.join("viewsync").join("viewsync.log"))
}
