//! Logging setup
//!
//! Console output goes to stderr so stdout carries only the summary tables.
//! `RUST_LOG` picks the filter (default `info`), `DISTRIBUTE_LOG_FORMAT` picks `json`
//! or `pretty`, and `--log-file` adds a JSON file sink.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const LOG_FORMAT_ENV: &str = "DISTRIBUTE_LOG_FORMAT";
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber; hold the guard until exit
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console = match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        Ok("pretty") => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![console];

    let mut guard = None;
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let (writer, file_guard) = tracing_appender::non_blocking(file);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}
