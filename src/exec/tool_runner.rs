// src/exec/tool_runner.rs

//! Runs one configured tool on top of the engine.
//!
//! This is where tool-level policy lives: progress profiles, timeouts
//! (built from a child cancellation token plus a timer) and whether a
//! nonzero exit counts as failure.

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EngineSection, ToolConfig};
use crate::errors::{Result, ToolrunError};
use crate::exec::engine::{ExecutionResult, ProcessEngine};
use crate::exec::subscriber::Subscribers;
use crate::progress::{ProgressEvent, ProgressTracker};

/// Run the tool `name` to completion.
///
/// - Progress events (if the tool has a profile) are logged and, when
///   `progress_tx` is given, forwarded to it.
/// - If a timeout applies and expires first, the process is killed and
///   [`ToolrunError::TimedOut`] is returned. Cancelling `cancel` yields
///   [`ToolrunError::Canceled`].
/// - With `require_success = true` a nonzero exit becomes
///   [`ToolrunError::NonZeroExit`].
pub async fn run_tool(
    engine: &ProcessEngine,
    name: &str,
    tool: &ToolConfig,
    engine_cfg: &EngineSection,
    cancel: &CancellationToken,
    progress_tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
) -> Result<ExecutionResult> {
    let invocation = tool.invocation();
    let timeout = tool.effective_timeout(engine_cfg)?;

    let mut subscribers = Subscribers::new();
    if let Some(profile) = tool.progress_profile()? {
        let tool_name = name.to_string();
        subscribers.push(ProgressTracker::new(profile.parser(), move |event| {
            let percent = (event.clamped() * 1000.0).round() / 10.0;
            info!(
                tool = %tool_name,
                percent,
                processed = event.processed,
                total = event.total,
                "progress"
            );
            if let Some(tx) = &progress_tx {
                let _ = tx.send(event);
            }
        }));
    }

    info!(tool = %name, program = %invocation.program().display(), ?timeout, "running tool");

    let run_cancel = cancel.child_token();
    let timer = timeout.map(|after| {
        let token = run_cancel.clone();
        let tool_name = name.to_string();
        tokio::spawn(async move {
            sleep(after).await;
            warn!(tool = %tool_name, ?after, "tool timed out; cancelling");
            token.cancel();
        })
    });

    let outcome = engine.execute(&invocation, &run_cancel, subscribers).await;

    if let Some(timer) = timer {
        timer.abort();
    }

    match outcome {
        Err(ToolrunError::Canceled) if !cancel.is_cancelled() => {
            // Only the timer could have cancelled the child token.
            let after = timeout.unwrap_or_default();
            Err(ToolrunError::TimedOut {
                program: name.to_string(),
                after,
            })
        }
        Err(e) => Err(e),
        Ok(result) => {
            debug!(
                tool = %name,
                exit_code = result.exit_code(),
                stdout_bytes = result.stdout().len(),
                stderr_bytes = result.stderr().len(),
                "tool finished"
            );
            if tool.require_success {
                result.ensure_success(name)
            } else {
                Ok(result)
            }
        }
    }
}
