//! Configuration file (`tecora.toml`) loading.
//!
//! Unknown fields are tolerated so older binaries keep reading newer
//! configuration files.

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct FlagsConfig {
    /// Invoke ED hooks on buffer events.
    #[serde(default)]
    pub hooks: bool,
    /// Enable function-key macros.
    #[serde(default = "default_true")]
    pub fnkeys: bool,
    /// Automatic EOL translation.
    #[serde(default = "default_true")]
    pub autoeol: bool,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            hooks: false,
            fnkeys: true,
            autoeol: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LogConfig {
    /// EnvFilter directive, e.g. `info,interp.undo=trace`.
    #[serde(default)]
    pub filter: Option<String>,
    /// Log file path; unset logs to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Woman pages registered into the help index at startup.
    #[serde(default)]
    pub help_files: Vec<String>,
}

/// Load configuration from an explicit path or the default discovery
/// location (`tecora.toml` in the working directory).
pub fn load(path: Option<&PathBuf>) -> Result<ConfigFile> {
    let candidate = path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("tecora.toml"));
    if !candidate.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = fs::read_to_string(&candidate)?;
    let parsed: ConfigFile = toml::from_str(&raw)?;
    info!(target: "config", path = %candidate.display(), "configuration loaded");
    Ok(parsed)
}
