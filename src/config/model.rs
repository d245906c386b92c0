// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::errors::{Result, ToolrunError};
use crate::exec::ToolInvocation;
use crate::progress::ProgressProfile;

/// Names accepted by `progress = "<name>"`.
pub const BUILTIN_PROGRESS_PROFILES: &[&str] = &["ffmpeg"];

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// working_dir = "/var/tmp/toolrun"
/// timeout = "10m"
///
/// [tool.encode]
/// program = "/usr/bin/ffmpeg"
/// args = "-y -i in.mkv out.mp4"
/// progress = "ffmpeg"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    /// All tools from `[tool.<name>]`, keyed by name.
    #[serde(default)]
    pub tool: BTreeMap<String, ToolConfig>,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub tool: BTreeMap<String, ToolConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(engine: EngineSection, tool: BTreeMap<String, ToolConfig>) -> Self {
        Self { engine, tool }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineSection {
    /// Working directory for tools that don't set their own.
    ///
    /// If `None`, the OS temp directory is used.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Default timeout for every tool (e.g. `"10m"`).
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[tool.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Resolved path of the executable. No PATH lookup is done here.
    pub program: PathBuf,

    /// Argument string, passed through as-is.
    #[serde(default)]
    pub args: String,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Overrides `[engine].timeout`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Treat a nonzero exit code as a failure of this tool.
    #[serde(default)]
    pub require_success: bool,

    /// Name of a built-in progress profile (see [`BUILTIN_PROGRESS_PROFILES`]).
    #[serde(default)]
    pub progress: Option<String>,

    /// Custom progress regexes; mutually exclusive with `progress`.
    #[serde(default)]
    pub progress_patterns: Option<ProgressPatterns>,
}

/// `[tool.<name>.progress_patterns]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressPatterns {
    /// Total-duration announcement; needs a `secs` or `h`/`m`/`s` groups.
    pub duration: String,

    /// Processed position; same group rules as `duration`.
    pub position: String,

    /// Optional `(done, total)` counter with `done` and `total` groups.
    #[serde(default)]
    pub counter: Option<String>,
}

impl ToolConfig {
    pub fn invocation(&self) -> ToolInvocation {
        let invocation = ToolInvocation::new(self.program.clone(), self.args.clone());
        match &self.working_dir {
            Some(dir) => invocation.in_dir(dir.clone()),
            None => invocation,
        }
    }

    /// Build the progress profile this tool asks for, if any.
    pub fn progress_profile(&self) -> Result<Option<ProgressProfile>> {
        match (&self.progress, &self.progress_patterns) {
            (Some(_), Some(_)) => Err(ToolrunError::ConfigError(
                "`progress` and `progress_patterns` are mutually exclusive".to_string(),
            )),
            (Some(name), None) => match name.as_str() {
                "ffmpeg" => Ok(Some(ProgressProfile::ffmpeg())),
                other => Err(ToolrunError::ConfigError(format!(
                    "unknown progress profile '{other}' (expected one of {BUILTIN_PROGRESS_PROFILES:?})"
                ))),
            },
            (None, Some(p)) => ProgressProfile::from_patterns(
                &p.duration,
                &p.position,
                p.counter.as_deref(),
            )
            .map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Tool timeout, falling back to `[engine].timeout`.
    pub fn effective_timeout(&self, engine: &EngineSection) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .or(engine.timeout.as_deref())
            .map(parse_duration)
            .transpose()
    }
}
