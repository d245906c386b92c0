// src/exec/engine.rs

//! Asynchronous external-process execution engine.
//!
//! [`ProcessEngine::execute`] spawns one child, registers it with the
//! [`ProcessRegistry`], drains stdout and stderr concurrently and resolves to
//! exactly one of:
//!
//! - `Ok(ExecutionResult)` once the process has exited **and** both streams
//!   have reached end-of-stream (nonzero exit codes are still `Ok`),
//! - `Err(ToolrunError::Canceled)` when the caller's token fires first,
//! - `Err(ToolrunError::Spawn)` / `Err(ToolrunError::InvalidArguments)` when
//!   the process could not be created (nothing is registered in that case).
//!
//! All of this happens inside one `select!` loop, so the returned future is
//! the single completion point: whichever branch finishes the loop decides
//! the outcome and the other paths simply never run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, ToolrunError};
use crate::exec::handle::ProcessHandle;
use crate::exec::line_reader::spawn_reader;
use crate::exec::registry::ProcessRegistry;
use crate::exec::subscriber::Subscribers;
use crate::types::{OutputLine, OutputStream};

/// Readers block on a full channel, which in turn lets the pipe apply
/// backpressure to the child.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// How long a killed process's pipes may stay open after its exit before
/// the remaining output is given up on.
const KILLED_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What to run: an already-resolved program, an opaque argument string and
/// an optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: PathBuf,
    arguments: String,
    working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, arguments: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            arguments: arguments.into(),
            working_dir: None,
        }
    }

    /// Run the program in `dir` instead of the engine's fallback directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Program file name, for log and error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }
}

/// Final outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl ExecutionResult {
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Every stdout line, in order, each terminated by `\n`.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Every stderr line, in order, each terminated by `\n`.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Escalate a nonzero exit into [`ToolrunError::NonZeroExit`].
    ///
    /// The engine never does this itself; some tools exit nonzero on
    /// perfectly usable runs, so the decision belongs to the caller.
    pub fn ensure_success(self, program: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(ToolrunError::NonZeroExit {
            program: program.to_string(),
            code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }

    pub fn into_parts(self) -> (i32, String, String) {
        (self.exit_code, self.stdout, self.stderr)
    }
}

/// Runs external programs and tracks them in a [`ProcessRegistry`].
///
/// The engine holds no per-invocation state and can be shared freely.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    registry: ProcessRegistry,
    fallback_dir: PathBuf,
}

impl Default for ProcessEngine {
    /// Engine bound to [`ProcessRegistry::global`].
    fn default() -> Self {
        Self::new(ProcessRegistry::global().clone())
    }
}

impl ProcessEngine {
    /// Create an engine that registers its processes in `registry`.
    ///
    /// Invocations without a working directory run in the OS temp dir.
    pub fn new(registry: ProcessRegistry) -> Self {
        Self {
            registry,
            fallback_dir: std::env::temp_dir(),
        }
    }

    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = dir.into();
        self
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn fallback_dir(&self) -> &Path {
        &self.fallback_dir
    }

    /// [`execute`](ProcessEngine::execute) without line subscribers.
    pub async fn execute_collect(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        self.execute(invocation, cancel, Subscribers::new()).await
    }

    /// Run `invocation` to completion or cancellation.
    ///
    /// `subscribers` receive every line (tagged by stream) before this
    /// future resolves.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
        mut subscribers: Subscribers,
    ) -> Result<ExecutionResult> {
        let working_dir = invocation.working_dir().unwrap_or(&self.fallback_dir);

        let mut handle = ProcessHandle::spawn(invocation, working_dir)?;
        let control = Arc::clone(handle.control());

        // Registered before any draining starts so kill_all can reach it.
        let mut registration = Some(self.registry.register(&control));

        info!(
            id = handle.id(),
            pid = ?handle.pid(),
            program = %invocation.program().display(),
            args = %invocation.arguments(),
            cwd = %working_dir.display(),
            "started process"
        );

        let (line_tx, mut line_rx) = mpsc::channel::<OutputLine>(LINE_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = handle.take_stdout() {
            readers.push(spawn_reader(stdout, OutputStream::Stdout, line_tx.clone()));
        }
        if let Some(stderr) = handle.take_stderr() {
            readers.push(spawn_reader(stderr, OutputStream::Stderr, line_tx.clone()));
        }
        // The channel closes once every reader has hit end-of-stream.
        drop(line_tx);

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code: Option<i32> = None;
        let mut drained = false;
        let mut kill_sent = false;
        let mut drain_deadline: Option<Instant> = None;

        let code = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(id = handle.id(), pid = ?handle.pid(), "cancellation requested; killing process");
                    if let Err(e) = handle.kill().await {
                        warn!(id = handle.id(), error = %e, "failed to kill process on cancellation");
                    }
                    for reader in &readers {
                        reader.abort();
                    }
                    drop(registration.take());
                    return Err(ToolrunError::Canceled);
                }

                _ = control.wait_for_kill_request(), if !kill_sent && exit_code.is_none() => {
                    kill_sent = true;
                    info!(id = handle.id(), pid = ?handle.pid(), "termination requested by registry");
                    if let Err(e) = handle.start_kill() {
                        warn!(id = handle.id(), error = %e, "failed to kill process");
                    }
                }

                line = line_rx.recv(), if !drained => {
                    match line {
                        Some(line) => {
                            debug!(id = handle.id(), stream = %line.stream, "{}", line.text);
                            dispatch(&line, &mut stdout, &mut stderr, &mut subscribers);
                        }
                        None => drained = true,
                    }
                }

                status = handle.wait(), if exit_code.is_none() => {
                    let code = status?;
                    exit_code = Some(code);
                    drop(registration.take());
                    if kill_sent {
                        drain_deadline = Some(Instant::now() + KILLED_DRAIN_GRACE);
                    }
                    debug!(id = handle.id(), exit_code = code, drained, "process exited");
                }

                _ = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() && !drained => {
                    // A descendant outside the killed group still holds a pipe.
                    warn!(id = handle.id(), grace = ?KILLED_DRAIN_GRACE, "output still open after kill; abandoning drain");
                    for reader in &readers {
                        reader.abort();
                    }
                    while let Ok(line) = line_rx.try_recv() {
                        dispatch(&line, &mut stdout, &mut stderr, &mut subscribers);
                    }
                    drained = true;
                }
            }

            if let (Some(code), true) = (exit_code, drained) {
                break code;
            }
        };

        info!(
            id = handle.id(),
            program = %invocation.program_name(),
            exit_code = code,
            success = code == 0,
            "process finished"
        );

        Ok(ExecutionResult {
            exit_code: code,
            stdout,
            stderr,
        })
    }
}

/// Append `line` to its stream's aggregate buffer, then notify subscribers.
fn dispatch(
    line: &OutputLine,
    stdout: &mut String,
    stderr: &mut String,
    subscribers: &mut Subscribers,
) {
    let buffer = match line.stream {
        OutputStream::Stdout => stdout,
        OutputStream::Stderr => stderr,
    };
    buffer.push_str(&line.text);
    buffer.push('\n');
    subscribers.notify(line);
}
