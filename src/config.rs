//! Configuration management for lifxctl

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::device::MacAddress;
use crate::error::{LifxError, LifxResult};
use crate::interrupt::DEFAULT_POLL_INTERVAL;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "LIFXCTL_CONFIG";

/// Configuration file used when neither `--config` nor the env var is set
pub const DEFAULT_CONFIG_FILE: &str = "lifxctl.toml";

/// UDP port LIFX bulbs listen on
pub const DEFAULT_LIFX_PORT: u16 = 56700;

/// Main lifxctl configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifxConfig {
    /// Default settings
    #[serde(default)]
    pub defaults: DefaultSettings,
    /// Known gateway bulb; without one, discovery finds nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayEntry>,
    /// Known bulbs behind the gateway
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSettings {
    /// Delay between cancellation checks in long-running commands (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How bulb labels are compared when looking a bulb up by name
    #[serde(default)]
    pub name_match: NameMatch,
}

/// Label comparison used by name lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameMatch {
    Exact,
    #[default]
    IgnoreCase,
}

impl NameMatch {
    pub fn matches(&self, label: &str, name: &str) -> bool {
        match self {
            NameMatch::Exact => label == name,
            NameMatch::IgnoreCase => label.to_lowercase() == name.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEntry {
    pub addr: Ipv4Addr,
    pub mac: MacAddress,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    pub mac: MacAddress,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_port() -> u16 {
    DEFAULT_LIFX_PORT
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            name_match: NameMatch::default(),
        }
    }
}

impl DefaultSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LifxConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> LifxResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LifxError::Config(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| LifxError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> LifxResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LifxResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LifxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| LifxError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Reject settings the rest of the crate cannot work with
    pub fn validate(&self) -> LifxResult<()> {
        if self.defaults.poll_interval_ms == 0 {
            return Err(LifxError::Config("poll_interval_ms must be greater than 0".to_string()));
        }
        if let Some(dup) = self
            .devices
            .iter()
            .enumerate()
            .find(|(i, a)| self.devices[..*i].iter().any(|b| b.mac == a.mac))
        {
            return Err(LifxError::Config(format!("Duplicate device MAC: {}", dup.1.mac)));
        }
        Ok(())
    }

    /// Resolve the configuration path: explicit, then environment, then default
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}
