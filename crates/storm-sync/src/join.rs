//! Fan-out/fan-in of the fetches behind one snapshot.

use std::sync::Arc;

use storm_proto::config::ViewStrategy;
use storm_proto::protocol::{TorrentLabels, TorrentState};
use thiserror::Error;

use crate::snapshot::Snapshot;
use crate::transport::{Transport, TransportError, VersionToken, ViewFetch};

#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The daemon claimed "unchanged" although no tag was sent.
    #[error("daemon reported an unchanged view without a version token")]
    UnexpectedUnchanged,
}

#[derive(Debug)]
pub enum JoinOutcome {
    Fresh {
        snapshot: Snapshot,
        token: Option<VersionToken>,
    },
    /// Keep the current snapshot and token.
    Unchanged,
}

/// Issues the fetches for one filter and combines them.  Cheap to clone; one
/// clone moves into each spawned join.
#[derive(Clone)]
pub struct SnapshotJoiner {
    transport: Arc<dyn Transport>,
    strategy: ViewStrategy,
    labels_enabled: bool,
}

impl SnapshotJoiner {
    pub fn new(transport: Arc<dyn Transport>, strategy: ViewStrategy) -> Self {
        Self {
            transport,
            strategy,
            labels_enabled: true,
        }
    }

    pub fn strategy(&self) -> ViewStrategy {
        self.strategy
    }

    /// Whether the split strategy fetches per-torrent labels.  Turned off when
    /// the daemon's label plugin is unavailable.
    pub fn set_labels_enabled(&mut self, enabled: bool) {
        self.labels_enabled = enabled;
    }

    pub async fn join(
        &self,
        filter: Option<TorrentState>,
        token: Option<VersionToken>,
    ) -> Result<JoinOutcome, JoinError> {
        match self.strategy {
            ViewStrategy::Combined => self.join_combined(filter, token).await,
            ViewStrategy::Split => self.join_split(filter).await,
        }
    }

    async fn join_combined(
        &self,
        filter: Option<TorrentState>,
        token: Option<VersionToken>,
    ) -> Result<JoinOutcome, JoinError> {
        match self.transport.fetch_view(token.as_ref(), filter).await? {
            ViewFetch::Modified { view, token } => Ok(JoinOutcome::Fresh {
                snapshot: Snapshot::from_view(view),
                token: Some(token),
            }),
            ViewFetch::Unchanged if token.is_some() => Ok(JoinOutcome::Unchanged),
            ViewFetch::Unchanged => Err(JoinError::UnexpectedUnchanged),
        }
    }

    async fn join_split(&self, filter: Option<TorrentState>) -> Result<JoinOutcome, JoinError> {
        let transport = self.transport.as_ref();
        let labels = async {
            if self.labels_enabled {
                transport.fetch_torrent_labels(filter).await
            } else {
                Ok(TorrentLabels::new())
            }
        };

        // First failure drops the remaining fetches; nothing partial survives.
        let (torrents, labels, session, free_space) = tokio::try_join!(
            transport.fetch_torrents(filter),
            labels,
            transport.fetch_session_status(),
            transport.fetch_free_space(),
        )?;

        Ok(JoinOutcome::Fresh {
            snapshot: Snapshot::from_parts(torrents, labels, session, free_space),
            token: None,
        })
    }
}
