// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `toolrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "toolrun",
    version,
    about = "Run configured command-line tools with live output capture and progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Config file (TOML), `Toolrun.toml` in the current directory by default.
    #[arg(short, long, value_name = "PATH", default_value = "Toolrun.toml")]
    pub config: PathBuf,

    /// Tools to run, by name. Runs every configured tool when omitted.
    #[arg(value_name = "TOOL")]
    pub tools: Vec<String>,

    /// Timeout applied to every tool (e.g. `30s`, `10m`), overriding
    /// `[engine].timeout`. Per-tool `timeout` still takes precedence.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TOOLRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the tools, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
