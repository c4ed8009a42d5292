//! Configuration management for btcli.
//!
//! Configuration is loaded from `~/.config/btcli/config.toml`. Every field is
//! optional; command line options take precedence over the file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the btpd directory.
pub const BTPD_HOME_ENV: &str = "BTPD_HOME";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The btpd directory, used when `-d` is not given.
    #[serde(default)]
    pub btpd_dir: Option<PathBuf>,
    /// Default template for `list` when `-f` is not given.
    #[serde(default)]
    pub list_format: Option<String>,
    /// Seconds to wait for the daemon socket to accept a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds to wait for each reply frame.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            btpd_dir: None,
            list_format: None,
            connect_timeout_secs: default_connect_timeout(),
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_reply_timeout() -> u64 {
    30
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("btcli"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, using defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    /// Locate the btpd directory.
    ///
    /// Tries, in order: the `-d` option, `$BTPD_HOME`, `btpd_dir` from the
    /// config file and `~/.btpd`. An explicit `-d` is used as given; the
    /// other candidates are only accepted if they are existing directories.
    pub fn find_btpd_dir(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }

        let candidates = std::env::var_os(BTPD_HOME_ENV)
            .map(PathBuf::from)
            .into_iter()
            .chain(self.btpd_dir.clone())
            .chain(dirs::home_dir().map(|home| home.join(".btpd")));

        for dir in candidates {
            if dir.is_dir() {
                debug!("Using btpd directory {}", dir.display());
                return Ok(dir);
            }
            debug!("Skipping btpd directory candidate {}", dir.display());
        }
        bail!("cannot find the btpd directory")
    }
}

/// Path of the daemon's IPC socket inside a btpd directory.
pub fn socket_path(btpd_dir: &Path) -> PathBuf {
    btpd_dir.join("sock")
}
