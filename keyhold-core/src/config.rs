//! Daemon configuration.
//!
//! Loaded from a TOML file; every section and field is optional, with
//! defaults resolved from the XDG base directories at lookup time (not at
//! deserialization time, so a config written on one machine stays portable).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot resolve {0}: neither XDG_DATA_HOME nor HOME is set")]
    NoDataDir(&'static str),

    #[error("cannot resolve agent socket: XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the credential store.
    /// Default: `$XDG_DATA_HOME/keyhold/store`.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Location of the service machine key.
    /// Default: `$XDG_DATA_HOME/keyhold/machine-key`.
    #[serde(default)]
    pub machine_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unix socket the daemon listens on.
    /// Default: `$XDG_RUNTIME_DIR/keyhold/agent.sock`.
    #[serde(default)]
    pub socket: Option<PathBuf>,
}

impl Config {
    /// Load from `path`.  A missing file is not an error — the daemon runs
    /// entirely on defaults in that case.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn store_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.root {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir("store root")?.join("store")),
        }
    }

    pub fn machine_key_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.machine_key {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir("machine key")?.join("machine-key")),
        }
    }

    pub fn socket_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.agent.socket {
            Some(p) => Ok(p.clone()),
            None => {
                let runtime = std::env::var_os("XDG_RUNTIME_DIR")
                    .ok_or(ConfigError::NoRuntimeDir)?;
                Ok(PathBuf::from(runtime).join("keyhold").join("agent.sock"))
            }
        }
    }
}

fn data_dir(what: &'static str) -> Result<PathBuf, ConfigError> {
    let base = if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        return Err(ConfigError::NoDataDir(what));
    };
    Ok(base.join("keyhold"))
}
