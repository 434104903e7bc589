//! Structured logging for the inventory console.
//!
//! Events go to a log file as JSON lines so they never mix with the menus
//! on stdout. Warnings and errors are echoed to stderr.
//!
//! Set `RUST_LOG` to change the file level:
//! - `RUST_LOG=debug` also records every navigation step
//! - `RUST_LOG=campus_inventory=trace` for everything from this crate

use std::path::Path;

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber writing to `log_file`.
///
/// The returned guard flushes pending lines when dropped, so the caller
/// keeps it alive for the whole session. Returns `None` when another
/// subscriber is already installed (tests, embedding).
pub fn init_logging(log_file: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log file path {} has no file name", log_file.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .json()
        .with_filter(filter);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(LevelFilter::WARN);

    if let Err(e) = tracing_subscriber::registry().with(file_layer).with(stderr_layer).try_init() {
        if e.to_string().contains("already been set") {
            return Ok(None);
        }
        return Err(e.into());
    }

    tracing::info!(path = %log_file.display(), "logging initialized");
    Ok(Some(guard))
}
