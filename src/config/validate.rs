// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, ToolConfig};
use crate::errors::{Result, ToolrunError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ToolrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.tool))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tools(cfg)?;
    validate_engine(cfg)?;
    for (name, tool) in cfg.tool.iter() {
        validate_tool(name, tool).map_err(|e| match e {
            ToolrunError::ConfigError(msg) => {
                ToolrunError::ConfigError(format!("tool '{name}': {msg}"))
            }
            other => other,
        })?;
    }
    Ok(())
}

fn ensure_has_tools(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tool.is_empty() {
        return Err(ToolrunError::ConfigError(
            "config must contain at least one [tool.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if let Some(timeout) = &cfg.engine.timeout {
        parse_duration(timeout)?;
    }
    Ok(())
}

fn validate_tool(name: &str, tool: &ToolConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ToolrunError::ConfigError("tool name must not be empty".to_string()));
    }

    if tool.program.as_os_str().is_empty() {
        return Err(ToolrunError::ConfigError("`program` must not be empty".to_string()));
    }

    // Windows passes the string through untouched, so there is nothing to check.
    #[cfg(not(windows))]
    {
        if shlex::split(&tool.args).is_none() {
            return Err(ToolrunError::ConfigError(format!(
                "`args` has unbalanced quoting: {:?}",
                tool.args
            )));
        }
    }

    if let Some(timeout) = &tool.timeout {
        parse_duration(timeout)?;
    }

    tool.progress_profile()?;
    Ok(())
}
