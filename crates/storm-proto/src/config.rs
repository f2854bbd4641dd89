use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
}

/// Where the storm REST API lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Base URL of the API; endpoint paths are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional pre-shared API key.  When absent the transport asks for one
    /// the first time the daemon answers 401.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// How the live view is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewStrategy {
    /// One `view` request carrying the last ETag.
    #[default]
    Combined,
    /// Four concurrent requests (torrents, labels, session, free space).
    Split,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub strategy: ViewStrategy,
    /// Daemon plugin checked (and offered for enabling) before polling starts.
    /// An empty string skips the check.
    #[serde(default = "default_required_plugin")]
    pub required_plugin: Option<String>,
}

/// Timings of the connection-lost banner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// How long the banner stays up after the connection recovers.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Length of the closing transition.
    #[serde(default = "default_closing_ms")]
    pub closing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Pause between creating a label and assigning it; Deluge drops an
    /// assignment issued immediately after the create.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            strategy: ViewStrategy::default(),
            required_plugin: default_required_plugin(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            closing_ms: default_closing_ms(),
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl DaemonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PollingConfig {
    pub fn required_plugin(&self) -> Option<&str> {
        self.required_plugin
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn interval(&self) -> Duration {
        // A zero period would turn the poll loop into a busy loop.
        Duration::from_millis(self.interval_ms.max(100))
    }
}

impl ConnectivityConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn closing(&self) -> Duration {
        Duration::from_millis(self.closing_ms)
    }
}

impl LabelsConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8221/api/".to_string()
}

fn default_request_timeout_ms() -> u64 {
    8000
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_required_plugin() -> Option<String> {
    Some("Label".to_string())
}

fn default_grace_ms() -> u64 {
    2000
}

fn default_closing_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    200
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
