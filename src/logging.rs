// src/logging.rs

//! Tracing setup for the `toolrun` binary.
//!
//! The filter is chosen as follows:
//! 1. `--log-level` sets one level for everything.
//! 2. Otherwise `TOOLRUN_LOG` is read as an `EnvFilter` directive string,
//!    so `TOOLRUN_LOG=toolrun::exec=debug,warn` works.
//! 3. Otherwise `info`.
//!
//! Output goes to stderr. Tool stdout is printed on stdout after each run.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const LOG_ENV: &str = "TOOLRUN_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to install tracing subscriber")
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
