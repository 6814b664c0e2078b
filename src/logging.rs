// src/logging.rs

use anyhow::{Context, Result};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install console and file logging. Keep the returned guard alive for the
/// whole run, or buffered file output is lost.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(cfg: &LoggingConfig) -> Result<WorkerGuard> {
    fs::create_dir_all(&cfg.dir)
        .with_context(|| format!("creating log directory {}", cfg.dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&cfg.dir, &cfg.file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    tracing_subscriber::registry()
        .with(env)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}
