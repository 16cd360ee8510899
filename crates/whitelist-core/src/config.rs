//! Typed service configuration
//!
//! Loaded once from TOML at startup and validated before anything connects.
//! An empty RCON password is fatal: Minecraft disables RCON entirely when
//! `rcon.password` is blank, so the service refuses to start instead of
//! degrading at runtime.

use crate::error::{Result, WhitelistError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which list-management command family the game server understands
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    /// Routed through the EasyWhitelist extension (`easywl ...`), for servers
    /// that cannot hot-reload the vanilla whitelist
    #[default]
    Legacy,
    /// Vanilla `whitelist ...` commands
    Native,
}

/// Remote console connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RconConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret; must be non-empty
    #[serde(default)]
    pub password: String,

    /// Timeout for connect, auth and each command round trip
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    25575
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RconConfig {
    /// `host:port` for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for RconConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Restricts self-service commands to a set of chat groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginFilter {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub allowed: BTreeSet<String>,

    /// Reply sent when a request comes from a group outside `allowed`
    #[serde(default = "default_refused_text")]
    pub refused_text: String,
}

fn default_refused_text() -> String {
    "This group is not on the allowed list for whitelist commands.".to_string()
}

impl Default for OriginFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed: BTreeSet::new(),
            refused_text: default_refused_text(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistConfig {
    #[serde(default)]
    pub rcon: RconConfig,

    #[serde(default)]
    pub list_mode: ListMode,

    /// Substrings that mark a failed removal; per-mode defaults when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_failure_markers: Option<Vec<String>>,

    #[serde(default = "default_max_bindings")]
    pub max_bindings_per_owner: usize,

    /// Chat identities holding the administrator capability
    #[serde(default)]
    pub admins: BTreeSet<String>,

    #[serde(default)]
    pub origin_filter: OriginFilter,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_max_bindings() -> usize {
    3
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/whitelist.db")
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            rcon: RconConfig::default(),
            list_mode: ListMode::default(),
            removal_failure_markers: None,
            max_bindings_per_owner: default_max_bindings(),
            admins: BTreeSet::new(),
            origin_filter: OriginFilter::default(),
            database_path: default_database_path(),
        }
    }
}

impl WhitelistConfig {
    /// Read, parse and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WhitelistError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WhitelistConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rcon.password.is_empty() {
            return Err(WhitelistError::Config(
                "rcon.password is empty; set rcon-password in server.properties and configure it here"
                    .to_string(),
            ));
        }
        if self.rcon.port == 0 {
            return Err(WhitelistError::Config("rcon.port must be 1-65535".to_string()));
        }
        if self.rcon.timeout_ms == 0 {
            return Err(WhitelistError::Config(
                "rcon.timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_bindings_per_owner == 0 {
            return Err(WhitelistError::Config(
                "max_bindings_per_owner must be at least 1".to_string(),
            ));
        }
        if let Some(markers) = &self.removal_failure_markers {
            if markers.iter().any(|m| m.trim().is_empty()) {
                return Err(WhitelistError::Config(
                    "removal_failure_markers must not contain empty entries".to_string(),
                ));
            }
        }
        Ok(())
    }
}
