// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`handle`] owns one spawned OS process ([`ProcessHandle`]) and the
//!   control block shared with the registry.
//! - [`registry`] tracks every live process for bulk termination.
//! - [`engine`] runs an invocation: spawn, register, drain both streams,
//!   resolve exactly once.
//! - [`line_reader`] splits redirected output into records.
//! - [`subscriber`] is the per-invocation line notification seam.
//! - [`tool_runner`] runs a configured tool on top of the engine, with
//!   progress reporting and timeouts.

pub mod engine;
pub mod handle;
pub mod line_reader;
pub mod registry;
pub mod subscriber;
pub mod tool_runner;

pub use engine::{ExecutionResult, ProcessEngine, ToolInvocation};
pub use handle::{ProcessControl, ProcessHandle};
pub use registry::{ProcessRegistry, Registration};
pub use subscriber::{ChannelSubscriber, LineSubscriber, Subscribers};
pub use tool_runner::run_tool;
