// ABOUTME: Configuration file for podbridge
// Loads endpoint, address style and logging settings from TOML with sensible defaults

use crate::identity::AddressStyle;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default server address, matching the webshell server's listen port
pub const DEFAULT_HOST: &str = "127.0.0.1:8090";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server `host[:port]` the WebSocket endpoints live on
    pub host: String,
    /// Use `wss` instead of `ws`
    pub secure: bool,
    /// How page addresses carry session coordinates
    pub address_style: AddressStyle,
    pub log_dir: Option<PathBuf>,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: false,
            address_style: AddressStyle::default(),
            log_dir: None,
            log_filter: None,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the default location if a file is there
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "podbridge").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory log files are written to
    pub fn log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        if let Some(dirs) = ProjectDirs::from("", "", "podbridge") {
            return dirs.data_dir().join("logs");
        }
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".podbridge").join("logs"))
            .unwrap_or_else(|_| PathBuf::from(".podbridge/logs"))
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or("podbridge=info")
    }
}
