//! The single owner of the published live view.
//!
//! Merges a fixed-period timer, the visibility signal and the filter into
//! ticks.  Each tick spawns one join; a newer tick aborts the join in flight
//! and bumps the generation, and any completion tagged with an older
//! generation is dropped on arrival.  Only this loop writes the snapshot,
//! health and version-token state; everyone else reads `watch` receivers.

use std::sync::Arc;
use std::time::Duration;

use storm_proto::config::{PollingConfig, ViewStrategy};
use storm_proto::protocol::TorrentState;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gate::IncrementalDiffGate;
use crate::join::{JoinError, JoinOutcome, SnapshotJoiner};
use crate::plugins::{PluginGate, PluginStatus};
use crate::snapshot::Snapshot;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub strategy: ViewStrategy,
    pub initial_filter: Option<TorrentState>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            strategy: ViewStrategy::Combined,
            initial_filter: None,
        }
    }
}

impl From<&PollingConfig> for PollerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            strategy: config.strategy,
            initial_filter: None,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum PollerCommand {
    /// Tick now, e.g. after the user changed something on the daemon.
    Refresh,
    RecheckPlugins,
}

#[derive(Debug, Clone, Copy)]
enum TickCause {
    Timer,
    Filter,
    Refresh,
}

type Completion = (u64, Result<JoinOutcome, JoinError>);

// ── Read side ────────────────────────────────────────────────────────────────

/// Read-only view of what the coordinator publishes.
#[derive(Debug, Clone)]
pub struct SyncView {
    snapshot: watch::Receiver<Option<Arc<Snapshot>>>,
    health: watch::Receiver<bool>,
}

impl SyncView {
    /// Last committed snapshot; `None` until the first join succeeds.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.health.borrow()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot.clone()
    }

    /// Notifies only on actual health changes.
    pub fn subscribe_health(&self) -> watch::Receiver<bool> {
        self.health.clone()
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

pub struct PollerHandle {
    filter: watch::Sender<Option<TorrentState>>,
    commands: mpsc::UnboundedSender<PollerCommand>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    view: SyncView,
}

impl PollerHandle {
    /// Switch the view to another state filter (`None` = all torrents).
    /// Ticks immediately when visible; setting the current value is a no-op.
    pub fn set_filter(&self, filter: Option<TorrentState>) {
        self.filter.send_if_modified(|current| {
            if *current == filter {
                return false;
            }
            *current = filter;
            true
        });
    }

    pub fn filter(&self) -> Option<TorrentState> {
        *self.filter.borrow()
    }

    pub fn refresh(&self) {
        let _ = self.commands.send(PollerCommand::Refresh);
    }

    pub fn recheck_plugins(&self) {
        let _ = self.commands.send(PollerCommand::RecheckPlugins);
    }

    pub fn view(&self) -> SyncView {
        self.view.clone()
    }

    /// Stop polling, cancel any join in flight, and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                warn!("PollingCoordinator task ended abnormally: {}", e);
            }
        }
    }
}

// ── PollingCoordinator ───────────────────────────────────────────────────────

pub struct PollingCoordinator {
    transport: Arc<dyn Transport>,
    joiner: SnapshotJoiner,
    plugins: Option<PluginGate>,
    interval: Duration,
    visibility: watch::Receiver<bool>,
    filter: watch::Receiver<Option<TorrentState>>,
    commands: mpsc::UnboundedReceiver<PollerCommand>,
    shutdown: CancellationToken,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    health_tx: watch::Sender<bool>,
    gate: IncrementalDiffGate,
    /// Generation of the newest join; completions from older ones are stale.
    generation: u64,
    in_flight: Option<AbortHandle>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// Plugin re-check running off the loop, if any.
    recheck: Option<AbortHandle>,
    plugin_tx: mpsc::UnboundedSender<PluginStatus>,
    plugin_rx: mpsc::UnboundedReceiver<PluginStatus>,
}

impl PollingCoordinator {
    /// Build the coordinator and its handle without starting it; the caller
    /// drives `run` itself.
    pub fn new(
        transport: Arc<dyn Transport>,
        visibility: watch::Receiver<bool>,
        plugins: Option<PluginGate>,
        config: PollerConfig,
    ) -> (Self, PollerHandle) {
        let (filter_tx, filter_rx) = watch::channel(config.initial_filter);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (health_tx, health_rx) = watch::channel(true);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (plugin_tx, plugin_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let coordinator = Self {
            joiner: SnapshotJoiner::new(Arc::clone(&transport), config.strategy),
            transport,
            plugins,
            interval: config.interval,
            visibility,
            filter: filter_rx,
            commands: commands_rx,
            shutdown: shutdown.clone(),
            snapshot_tx,
            health_tx,
            gate: IncrementalDiffGate::new(),
            generation: 0,
            in_flight: None,
            completions_tx,
            completions_rx,
            recheck: None,
            plugin_tx,
            plugin_rx,
        };

        let handle = PollerHandle {
            filter: filter_tx,
            commands: commands_tx,
            shutdown,
            task: None,
            view: SyncView {
                snapshot: snapshot_rx,
                health: health_rx,
            },
        };

        (coordinator, handle)
    }

    /// Build and start the coordinator on the current runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        visibility: watch::Receiver<bool>,
        plugins: Option<PluginGate>,
        config: PollerConfig,
    ) -> PollerHandle {
        let (coordinator, mut handle) = Self::new(transport, visibility, plugins, config);
        handle.task = Some(tokio::spawn(coordinator.run()));
        handle
    }

    /// Run until shut down or until the handle is dropped.
    pub async fn run(mut self) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            strategy = ?self.joiner.strategy(),
            "PollingCoordinator: starting"
        );

        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("PollingCoordinator: shut down during plugin check");
                return;
            }
            _ = self.check_plugins() => {}
        }

        // First tick fires immediately; ticks missed while busy are skipped,
        // never replayed.
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("PollingCoordinator: shutdown requested");
                    break;
                }

                _ = timer.tick() => self.tick(TickCause::Timer),

                changed = self.filter.changed() => {
                    if changed.is_err() {
                        info!("PollingCoordinator: handle dropped, stopping");
                        break;
                    }
                    self.tick(TickCause::Filter);
                }

                Some(cmd) = self.commands.recv() => match cmd {
                    PollerCommand::Refresh => self.tick(TickCause::Refresh),
                    PollerCommand::RecheckPlugins => self.spawn_recheck(),
                },

                Some((generation, outcome)) = self.completions_rx.recv() => {
                    self.commit(generation, outcome);
                }

                Some(status) = self.plugin_rx.recv() => {
                    self.recheck = None;
                    self.apply_plugin_status(status);
                }
            }
        }

        if let Some(join) = self.in_flight.take() {
            join.abort();
        }
        if let Some(recheck) = self.recheck.take() {
            recheck.abort();
        }
    }

    async fn check_plugins(&mut self) {
        let Some(gate) = &self.plugins else {
            return;
        };
        let status = gate.check(self.transport.as_ref()).await;
        self.apply_plugin_status(status);
    }

    /// Re-run the plugin gate in its own task so a pending prompt never
    /// stalls ticks, commits or shutdown.
    fn spawn_recheck(&mut self) {
        let Some(gate) = self.plugins.clone() else {
            return;
        };
        if self.recheck.is_some() {
            debug!("PollingCoordinator: plugin re-check already running");
            return;
        }

        let transport = Arc::clone(&self.transport);
        let status_tx = self.plugin_tx.clone();
        let task = tokio::spawn(async move {
            let status = gate.check(transport.as_ref()).await;
            let _ = status_tx.send(status);
        });
        self.recheck = Some(task.abort_handle());
    }

    fn apply_plugin_status(&mut self, status: PluginStatus) {
        if let Some(gate) = &self.plugins {
            info!(plugin = gate.plugin(), ?status, "PollingCoordinator: plugin check");
        }
        // Unknown keeps fetching labels; a later recheck can still turn them off.
        self.joiner
            .set_labels_enabled(status != PluginStatus::Unavailable);
    }

    fn tick(&mut self, cause: TickCause) {
        // Always consume the filter so a change made while hidden does not
        // keep `changed()` ready forever.
        let filter = *self.filter.borrow_and_update();

        if !*self.visibility.borrow() {
            debug!(?cause, "PollingCoordinator: tick suppressed, surface hidden");
            return;
        }

        self.generation += 1;
        if let Some(previous) = self.in_flight.take() {
            debug!(
                generation = self.generation,
                "PollingCoordinator: superseding join in flight"
            );
            previous.abort();
        }

        let generation = self.generation;
        let joiner = self.joiner.clone();
        let token = self.gate.token();
        let completions = self.completions_tx.clone();
        debug!(?cause, ?filter, generation, has_token = token.is_some(), "PollingCoordinator: join");

        let join = tokio::spawn(async move {
            let outcome = joiner.join(filter, token).await;
            let _ = completions.send((generation, outcome));
        });
        self.in_flight = Some(join.abort_handle());
    }

    fn commit(&mut self, generation: u64, outcome: Result<JoinOutcome, JoinError>) {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "PollingCoordinator: dropping stale join result"
            );
            return;
        }
        self.in_flight = None;

        match outcome {
            Ok(JoinOutcome::Fresh { snapshot, token }) => {
                debug!(torrents = snapshot.len(), "PollingCoordinator: snapshot committed");
                self.gate.record(token);
                self.snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                self.set_health(true);
            }
            Ok(JoinOutcome::Unchanged) => {
                debug!("PollingCoordinator: view unchanged");
                self.set_health(true);
            }
            Err(err) => {
                warn!("PollingCoordinator: join failed: {}", err);
                self.gate.invalidate();
                self.set_health(false);
            }
        }
    }

    fn set_health(&self, connected: bool) {
        let changed = self.health_tx.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            true
        });
        if changed {
            info!(connected, "PollingCoordinator: connection health changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storm_proto::protocol::{
        SessionStatus, TorrentLabels, Torrents, ViewTorrent, ViewUpdate,
    };

    use crate::transport::{TransportError, VersionToken, ViewFetch};

    /// Transport that is never called; `commit` is exercised directly.
    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn fetch_view(
            &self,
            _token: Option<&VersionToken>,
            _filter: Option<TorrentState>,
        ) -> Result<ViewFetch, TransportError> {
            unreachable!()
        }
        async fn fetch_torrents(
            &self,
            _filter: Option<TorrentState>,
        ) -> Result<Torrents, TransportError> {
            unreachable!()
        }
        async fn fetch_torrent_labels(
            &self,
            _filter: Option<TorrentState>,
        ) -> Result<TorrentLabels, TransportError> {
            unreachable!()
        }
        async fn fetch_session_status(&self) -> Result<SessionStatus, TransportError> {
            unreachable!()
        }
        async fn fetch_free_space(&self) -> Result<i64, TransportError> {
            unreachable!()
        }
        async fn fetch_label_corpus(&self) -> Result<Vec<String>, TransportError> {
            unreachable!()
        }
        async fn create_label(&self, _name: &str) -> Result<(), TransportError> {
            unreachable!()
        }
        async fn delete_label(&self, _name: &str) -> Result<(), TransportError> {
            unreachable!()
        }
        async fn set_torrent_label(&self, _id: &str, _label: &str) -> Result<(), TransportError> {
            unreachable!()
        }
        async fn list_plugins(&self) -> Result<Vec<String>, TransportError> {
            unreachable!()
        }
        async fn enable_plugin(&self, _name: &str) -> Result<(), TransportError> {
            unreachable!()
        }
    }

    fn fresh(hash: &str, token: &str) -> Result<JoinOutcome, JoinError> {
        let view = ViewUpdate {
            torrents: vec![ViewTorrent {
                hash: hash.to_string(),
                label: String::new(),
                status: Default::default(),
            }],
            ..ViewUpdate::default()
        };
        Ok(JoinOutcome::Fresh {
            snapshot: Snapshot::from_view(view),
            token: Some(VersionToken::new(token)),
        })
    }

    fn coordinator() -> (PollingCoordinator, PollerHandle) {
        let (_visible_tx, visible_rx) = watch::channel(true);
        PollingCoordinator::new(
            Arc::new(Unreachable),
            visible_rx,
            None,
            PollerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let (mut coordinator, handle) = coordinator();
        let view = handle.view();
        coordinator.generation = 2;

        coordinator.commit(2, fresh("new", "t2"));
        // A slower, superseded join settling afterwards must not win.
        coordinator.commit(1, fresh("old", "t1"));

        let snapshot = view.snapshot().unwrap();
        assert_eq!(snapshot.ids(), vec!["new"]);
        assert_eq!(coordinator.gate.token(), Some(VersionToken::new("t2")));
    }

    #[tokio::test]
    async fn test_failure_keeps_snapshot_and_clears_token() {
        let (mut coordinator, handle) = coordinator();
        let view = handle.view();
        coordinator.generation = 1;
        coordinator.commit(1, fresh("a", "t1"));
        let before = view.snapshot().unwrap();

        coordinator.generation = 2;
        coordinator.commit(
            2,
            Err(JoinError::Transport(TransportError::Status {
                code: 502,
                message: "bad gateway".to_string(),
            })),
        );

        assert!(Arc::ptr_eq(&before, &view.snapshot().unwrap()));
        assert!(!view.is_connected());
        assert_eq!(coordinator.gate.token(), None);
    }

    #[tokio::test]
    async fn test_unchanged_restores_health_only() {
        let (mut coordinator, handle) = coordinator();
        let view = handle.view();
        coordinator.generation = 1;
        coordinator.commit(1, fresh("a", "t1"));
        let before = view.snapshot().unwrap();

        coordinator.generation = 2;
        coordinator.commit(2, Ok(JoinOutcome::Unchanged));

        assert!(Arc::ptr_eq(&before, &view.snapshot().unwrap()));
        assert!(view.is_connected());
        assert_eq!(coordinator.gate.token(), Some(VersionToken::new("t1")));
    }
}
