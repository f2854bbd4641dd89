//! Startup capability check for daemon plugins.
//!
//! The coordinator awaits the gate once before its first tick and again only
//! when asked to re-check; steady-state polling never consults it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::transport::Transport;

/// Asks whether a missing plugin may be enabled on the daemon.
#[async_trait]
pub trait PluginPrompt: Send + Sync {
    async fn confirm_enable(&self, plugin: &str) -> bool;
}

/// Enables missing plugins without asking.
pub struct AutoEnable;

#[async_trait]
impl PluginPrompt for AutoEnable {
    async fn confirm_enable(&self, _plugin: &str) -> bool {
        true
    }
}

/// Never touches the daemon's plugin set.
pub struct NeverEnable;

#[async_trait]
impl PluginPrompt for NeverEnable {
    async fn confirm_enable(&self, _plugin: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Enabled,
    /// Missing and not enabled.
    Unavailable,
    /// The daemon could not be asked.
    Unknown,
}

#[derive(Clone)]
pub struct PluginGate {
    plugin: String,
    prompt: Arc<dyn PluginPrompt>,
}

impl PluginGate {
    pub fn new(plugin: impl Into<String>, prompt: Arc<dyn PluginPrompt>) -> Self {
        Self {
            plugin: plugin.into(),
            prompt,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub async fn check(&self, transport: &dyn Transport) -> PluginStatus {
        let enabled = match transport.list_plugins().await {
            Ok(plugins) => plugins,
            Err(err) => {
                warn!(plugin = %self.plugin, error = %err, "Failed to list daemon plugins");
                return PluginStatus::Unknown;
            }
        };

        if enabled.iter().any(|p| p.eq_ignore_ascii_case(&self.plugin)) {
            return PluginStatus::Enabled;
        }

        if !self.prompt.confirm_enable(&self.plugin).await {
            info!(plugin = %self.plugin, "Plugin left disabled");
            return PluginStatus::Unavailable;
        }

        match transport.enable_plugin(&self.plugin).await {
            Ok(()) => {
                info!(plugin = %self.plugin, "Plugin enabled");
                PluginStatus::Enabled
            }
            Err(err) => {
                warn!(plugin = %self.plugin, error = %err, "Failed to enable plugin");
                PluginStatus::Unavailable
            }
        }
    }
}
