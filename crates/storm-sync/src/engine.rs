use std::sync::Arc;

use storm_proto::config::Config;
use storm_proto::protocol::TorrentState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::connectivity::{Affordance, ConnectivityPresenter};
use crate::plugins::{PluginGate, PluginPrompt};
use crate::poller::{PollerConfig, PollerHandle, PollingCoordinator, SyncView};
use crate::transport::Transport;
use crate::visibility::VisibilityTracker;

/// One running live view: visibility, coordinator and presenter wired
/// together against a single transport.
pub struct SyncEngine {
    visibility: VisibilityTracker,
    poller: PollerHandle,
    presenter: ConnectivityPresenter,
    presenter_task: JoinHandle<()>,
}

impl SyncEngine {
    pub fn start(
        transport: Arc<dyn Transport>,
        config: &Config,
        plugin_prompt: Arc<dyn PluginPrompt>,
        initial_filter: Option<TorrentState>,
    ) -> Self {
        let visibility = VisibilityTracker::new();
        let plugins = config
            .polling
            .required_plugin()
            .map(|name| PluginGate::new(name, plugin_prompt));

        let poller_config = PollerConfig {
            initial_filter,
            ..PollerConfig::from(&config.polling)
        };
        let poller = PollingCoordinator::spawn(
            transport,
            visibility.subscribe(),
            plugins,
            poller_config,
        );

        let presenter = ConnectivityPresenter::new(
            config.connectivity.grace(),
            config.connectivity.closing(),
        );
        let presenter_task = presenter.drive(poller.view().subscribe_health());

        info!(?initial_filter, "Sync engine started");
        Self {
            visibility,
            poller,
            presenter,
            presenter_task,
        }
    }

    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    pub fn view(&self) -> SyncView {
        self.poller.view()
    }

    pub fn affordance(&self) -> watch::Receiver<Affordance> {
        self.presenter.subscribe()
    }

    pub async fn shutdown(self) {
        self.poller.shutdown().await;
        // The health sender is gone once the coordinator exits.
        let _ = self.presenter_task.await;
        info!("Sync engine stopped");
    }
}
