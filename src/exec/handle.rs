// src/exec/handle.rs

//! Owned representation of one spawned OS process.
//!
//! A [`ProcessHandle`] is owned by exactly one engine invocation. The part
//! that the registry needs for bulk termination lives in [`ProcessControl`],
//! which the handle shares via `Arc` and the registry only holds weakly.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::errors::{Result, ToolrunError};
use crate::exec::engine::ToolInvocation;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Registry-facing control block of a spawned process.
#[derive(Debug)]
pub struct ProcessControl {
    id: u64,
    pid: Option<u32>,
    program: PathBuf,
    exited: AtomicBool,
    kill: CancellationToken,
}

impl ProcessControl {
    fn new(pid: Option<u32>, program: PathBuf) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            pid,
            program,
            exited: AtomicBool::new(false),
            kill: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Ask the owning invocation to force-terminate the process.
    ///
    /// Fails with `InvalidInput` when the process has already exited.
    /// Repeated requests for a live process are accepted.
    pub fn request_kill(&self) -> io::Result<()> {
        if self.has_exited() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "process already exited",
            ));
        }
        self.kill.cancel();
        Ok(())
    }

    pub fn kill_requested(&self) -> bool {
        self.kill.is_cancelled()
    }

    pub(crate) fn wait_for_kill_request(&self) -> WaitForCancellationFuture<'_> {
        self.kill.cancelled()
    }

    fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }
}

/// One live or exited child process with redirected stdout/stderr.
#[derive(Debug)]
pub struct ProcessHandle {
    program: PathBuf,
    arguments: String,
    working_dir: PathBuf,
    child: Child,
    exit_code: Option<i32>,
    stdout_redirected: bool,
    stderr_redirected: bool,
    control: Arc<ProcessControl>,
}

impl ProcessHandle {
    /// Spawn the invocation's program in `working_dir`.
    ///
    /// No shell is involved. On Unix the argument string is split into argv
    /// with POSIX shell-word rules; on Windows it is appended verbatim to the
    /// command line.
    pub fn spawn(invocation: &ToolInvocation, working_dir: &Path) -> Result<Self> {
        let mut cmd = build_command(invocation, working_dir)?;

        let child = cmd.spawn().map_err(|source| ToolrunError::Spawn {
            program: invocation.program().to_path_buf(),
            source,
        })?;

        let control = Arc::new(ProcessControl::new(
            child.id(),
            invocation.program().to_path_buf(),
        ));

        debug!(
            id = control.id(),
            pid = ?control.pid(),
            program = %invocation.program().display(),
            "spawned child process"
        );

        Ok(Self {
            program: invocation.program().to_path_buf(),
            arguments: invocation.arguments().to_string(),
            working_dir: working_dir.to_path_buf(),
            child,
            exit_code: None,
            stdout_redirected: true,
            stderr_redirected: true,
            control,
        })
    }

    pub fn control(&self) -> &Arc<ProcessControl> {
        &self.control
    }

    pub fn id(&self) -> u64 {
        self.control.id()
    }

    pub fn pid(&self) -> Option<u32> {
        self.control.pid()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Exit code; `None` until termination has been observed.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout_redirected(&self) -> bool {
        self.stdout_redirected
    }

    pub fn stderr_redirected(&self) -> bool {
        self.stderr_redirected
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the process to exit and record its exit code.
    ///
    /// A process terminated without a code (e.g. by a signal) reports `-1`.
    pub async fn wait(&mut self) -> io::Result<i32> {
        let status = self.child.wait().await?;
        let code = status.code().unwrap_or(-1);
        self.exit_code = Some(code);
        self.control.mark_exited();
        Ok(code)
    }

    /// Send a kill without waiting for the exit.
    ///
    /// On Unix the child leads its own process group and the whole group is
    /// killed, so grandchildren holding the pipes go down with it. Killing a
    /// process that has already exited is not an error.
    pub fn start_kill(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid() {
                if let Err(e) = kill_process_group(pid) {
                    debug!(id = self.id(), error = %e, "process group kill failed; killing child only");
                }
            }
        }

        match self.child.start_kill() {
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                debug!(id = self.id(), "kill skipped; process already exited");
                Ok(())
            }
            other => other,
        }
    }

    /// Kill the process and wait until the OS has reaped it.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.start_kill()?;
        if self.exit_code.is_none() {
            self.wait().await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Group already gone.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

fn build_command(invocation: &ToolInvocation, working_dir: &Path) -> Result<Command> {
    let mut cmd = Command::new(invocation.program());

    // New process group with the child as leader (pgid == pid).
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    #[cfg(not(windows))]
    {
        let argv = shlex::split(invocation.arguments()).ok_or_else(|| {
            ToolrunError::InvalidArguments(format!(
                "unbalanced quoting in {:?}",
                invocation.arguments()
            ))
        })?;
        cmd.args(argv);
    }

    #[cfg(windows)]
    {
        if !invocation.arguments().is_empty() {
            cmd.raw_arg(invocation.arguments());
        }
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok(cmd)
}
