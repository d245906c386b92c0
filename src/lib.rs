// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod types;

use anyhow::{Context, Result, bail};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate, parse_duration};
use crate::errors::ToolrunError;
use crate::exec::{ProcessEngine, ProcessRegistry, run_tool};

pub use crate::exec::{ExecutionResult, ToolInvocation};
pub use crate::types::{OutputLine, OutputStream};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the process engine bound to the global registry
/// - one concurrent run per selected tool
/// - Ctrl-C handling (cancel everything, then kill whatever is still tracked)
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if let Some(timeout) = &args.timeout {
        parse_duration(timeout)?;
        cfg.engine.timeout = Some(timeout.clone());
    }

    let selected = select_tools(&cfg, &args.tools)?;

    if args.dry_run {
        print_dry_run(&cfg, &selected);
        return Ok(());
    }

    let registry = ProcessRegistry::global().clone();
    let mut engine = ProcessEngine::new(registry.clone());
    if let Some(dir) = &cfg.engine.working_dir {
        engine = engine.with_fallback_dir(dir.clone());
    }

    let root = CancellationToken::new();

    // Ctrl-C → cancel every run, then make sure nothing is left behind.
    {
        let root = root.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("interrupt received; cancelling running tools");
            root.cancel();
            registry.kill_all();
        });
    }

    let mut runs = JoinSet::new();
    for name in selected {
        let Some(tool) = cfg.tool.get(&name).cloned() else {
            continue;
        };
        let engine = engine.clone();
        let engine_cfg = cfg.engine.clone();
        let cancel = root.clone();

        runs.spawn(async move {
            let outcome = run_tool(&engine, &name, &tool, &engine_cfg, &cancel, None).await;
            (name, outcome)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = runs.join_next().await {
        let (name, outcome) = joined?;
        match outcome {
            Ok(result) => {
                info!(tool = %name, exit_code = result.exit_code(), "tool completed");
                print!("{}", result.stdout());
            }
            Err(ToolrunError::Canceled) => {
                info!(tool = %name, "tool cancelled");
                failed.push(name);
            }
            Err(e) => {
                error!(tool = %name, error = %e, "tool failed");
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} tool(s) did not complete: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Resolve the CLI tool names, defaulting to every configured tool.
fn select_tools(cfg: &ConfigFile, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(cfg.tool.keys().cloned().collect());
    }

    for name in requested {
        if !cfg.tool.contains_key(name) {
            bail!("unknown tool '{name}'");
        }
    }
    Ok(requested.to_vec())
}

fn print_dry_run(cfg: &ConfigFile, selected: &[String]) {
    println!("toolrun dry-run");
    if let Some(dir) = &cfg.engine.working_dir {
        println!("  engine.working_dir = {}", dir.display());
    }
    if let Some(timeout) = &cfg.engine.timeout {
        println!("  engine.timeout = {timeout}");
    }
    println!();

    println!("tools ({}):", selected.len());
    for name in selected {
        let Some(tool) = cfg.tool.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      program: {}", tool.program.display());
        if !tool.args.is_empty() {
            println!("      args: {}", tool.args);
        }
        if let Some(dir) = &tool.working_dir {
            println!("      working_dir: {}", dir.display());
        }
        if let Some(timeout) = &tool.timeout {
            println!("      timeout: {timeout}");
        }
        if tool.require_success {
            println!("      require_success: true");
        }
        if let Some(profile) = &tool.progress {
            println!("      progress: {profile}");
        }
        if let Some(patterns) = &tool.progress_patterns {
            println!("      progress_patterns.duration: {}", patterns.duration);
            println!("      progress_patterns.position: {}", patterns.position);
            if let Some(counter) = &patterns.counter {
                println!("      progress_patterns.counter: {counter}");
            }
        }
    }
}
