#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use toolrun::config::{ConfigFile, EngineSection, ProgressPatterns, RawConfigFile, ToolConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                tool: BTreeMap::new(),
            },
        }
    }

    pub fn with_tool(mut self, name: &str, tool: ToolConfig) -> Self {
        self.config.tool.insert(name.to_string(), tool);
        self
    }

    pub fn engine_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.engine.working_dir = Some(dir.into());
        self
    }

    pub fn engine_timeout(mut self, timeout: &str) -> Self {
        self.config.engine.timeout = Some(timeout.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ToolConfig`.
pub struct ToolConfigBuilder {
    tool: ToolConfig,
}

impl ToolConfigBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            tool: ToolConfig {
                program: PathBuf::from(program),
                args: String::new(),
                working_dir: None,
                timeout: None,
                require_success: false,
                progress: None,
                progress_patterns: None,
            },
        }
    }

    /// `sh -c <script>` tool.
    pub fn shell(script: &str) -> Self {
        let quoted = shlex::try_quote(script).expect("script must not contain NUL bytes");
        Self::new("sh").args(&format!("-c {quoted}"))
    }

    pub fn args(mut self, args: &str) -> Self {
        self.tool.args = args.to_string();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.tool.timeout = Some(timeout.to_string());
        self
    }

    pub fn require_success(mut self, val: bool) -> Self {
        self.tool.require_success = val;
        self
    }

    pub fn progress(mut self, profile: &str) -> Self {
        self.tool.progress = Some(profile.to_string());
        self
    }

    pub fn progress_patterns(mut self, duration: &str, position: &str) -> Self {
        self.tool.progress_patterns = Some(ProgressPatterns {
            duration: duration.to_string(),
            position: position.to_string(),
            counter: None,
        });
        self
    }

    pub fn build(self) -> ToolConfig {
        self.tool
    }
}
