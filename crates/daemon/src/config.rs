// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: built-in defaults, optional TOML file, environment.

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tkv_storage::{PostgresParams, DEFAULT_QUEUE_CAPACITY};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4000";

/// Where the transaction log lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Append-only text file
    File { path: PathBuf },
    /// SQLite database holding the `transactions` table
    Sqlite { path: PathBuf },
    /// PostgreSQL server holding the `transactions` table
    Postgres(PostgresParams),
}

impl BackendConfig {
    /// Local file holding the log, if the backend keeps one
    pub fn path(&self) -> Option<&Path> {
        match self {
            BackendConfig::File { path } | BackendConfig::Sqlite { path } => Some(path),
            BackendConfig::Postgres(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::File { .. } => "file",
            BackendConfig::Sqlite { .. } => "sqlite",
            BackendConfig::Postgres(_) => "postgres",
        }
    }
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::File { path } | BackendConfig::Sqlite { path } => {
                write!(f, "{}", path.display())
            }
            BackendConfig::Postgres(params) => write!(f, "{}", params),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address
    pub bind_addr: SocketAddr,
    /// Directory holding the log, lock file and daemon log
    pub state_dir: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    pub backend: BackendConfig,
    /// Depth of the write queue
    pub queue_capacity: usize,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Invalid bind address {0:?}: {1}")]
    BindAddr(String, #[source] AddrParseError),

    #[error("queue_capacity must be at least 1")]
    ZeroCapacity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    bind_addr: Option<String>,
    state_dir: Option<PathBuf>,
    log_path: Option<PathBuf>,
    queue_capacity: Option<usize>,
    backend: Option<BackendFile>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum BackendFile {
    File { path: Option<PathBuf> },
    Sqlite { path: Option<PathBuf> },
    Postgres {
        host: String,
        dbname: String,
        user: String,
        password: Option<String>,
    },
}

impl Config {
    /// Load configuration from the process environment and an optional file
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let text = match file {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?,
            ),
            None => None,
        };
        let origin = file.map(Path::to_path_buf).unwrap_or_default();
        Self::resolve(text.as_deref(), &origin, |key| std::env::var(key).ok())
    }

    /// Merge defaults, file contents and environment lookups
    ///
    /// `origin` only labels parse errors.
    pub fn resolve(
        text: Option<&str>,
        origin: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: ConfigFile = match text {
            Some(text) => {
                toml::from_str(text).map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?
            }
            None => ConfigFile::default(),
        };

        let state_dir = match file.state_dir {
            Some(dir) => dir,
            None => default_state_dir(&env)?,
        };

        let backend = match file.backend {
            None | Some(BackendFile::File { path: None }) => BackendConfig::File {
                path: state_dir.join("transactions.log"),
            },
            Some(BackendFile::File { path: Some(path) }) => BackendConfig::File {
                path: state_dir.join(path),
            },
            Some(BackendFile::Sqlite { path }) => BackendConfig::Sqlite {
                path: state_dir.join(path.unwrap_or_else(|| PathBuf::from("transactions.db"))),
            },
            Some(BackendFile::Postgres {
                host,
                dbname,
                user,
                password,
            }) => {
                let password = env("TKV_PG_PASSWORD").or(password).unwrap_or_default();
                BackendConfig::Postgres(PostgresParams::new(host, dbname, user, password))
            }
        };

        let log_path = state_dir.join(file.log_path.unwrap_or_else(|| PathBuf::from("daemon.log")));

        let bind_addr = env("TKV_BIND_ADDR")
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| ConfigError::BindAddr(bind_addr.clone(), e))?;

        let queue_capacity = file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(Self {
            bind_addr,
            lock_path: state_dir.join("daemon.pid"),
            state_dir,
            log_path,
            backend,
            queue_capacity,
        })
    }
}

/// `$TKV_STATE_DIR`, else `$XDG_STATE_HOME/tkv`, else `~/.local/state/tkv`
fn default_state_dir(env: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env("TKV_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = env("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("tkv"));
    }
    let home = env("HOME").ok_or(ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/tkv"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
