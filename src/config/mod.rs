// src/config/mod.rs

//! Configuration loading and validation for toolrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate tool definitions and progress patterns (`validate.rs`).
//! - Parse human duration strings like `"3s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, parse_and_validate};
pub use model::{ConfigFile, EngineSection, ProgressPatterns, RawConfigFile, ToolConfig};
