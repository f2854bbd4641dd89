//! The joined view-model published to display layers.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use storm_proto::protocol::{
    SessionStatus, Torrent, TorrentLabels, TorrentState, Torrents, ViewUpdate,
};

/// Everything polled from the daemon at one instant.
///
/// Built only from a complete join, so every torrent has a label entry (the
/// empty string when unlabelled) and no label refers to a torrent outside the
/// view.  Published behind an `Arc` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    torrents: BTreeMap<String, Torrent>,
    labels: BTreeMap<String, String>,
    session: SessionStatus,
    free_space: i64,
    fetched_at: DateTime<Local>,
}

impl Snapshot {
    /// Join separately fetched resources by torrent id.
    pub fn from_parts(
        torrents: Torrents,
        mut labels: TorrentLabels,
        session: SessionStatus,
        free_space: i64,
    ) -> Self {
        let torrents: BTreeMap<String, Torrent> = torrents.into_iter().collect();
        let labels = torrents
            .keys()
            .map(|id| (id.clone(), labels.remove(id).unwrap_or_default()))
            .collect();

        Self {
            torrents,
            labels,
            session,
            free_space,
            fetched_at: Local::now(),
        }
    }

    /// Unpack a combined view, which already carries the label on each row.
    pub fn from_view(view: ViewUpdate) -> Self {
        let mut torrents = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for row in view.torrents {
            labels.insert(row.hash.clone(), row.label);
            torrents.insert(row.hash, row.status);
        }

        Self {
            torrents,
            labels,
            session: view.session,
            free_space: view.disk_free,
            fetched_at: Local::now(),
        }
    }

    pub fn torrents(&self) -> &BTreeMap<String, Torrent> {
        &self.torrents
    }

    pub fn torrent(&self, id: &str) -> Option<&Torrent> {
        self.torrents.get(id)
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Label of a torrent in the view; `""` when unlabelled.
    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn session(&self) -> &SessionStatus {
        &self.session
    }

    pub fn free_space(&self) -> i64 {
        self.free_space
    }

    pub fn fetched_at(&self) -> DateTime<Local> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }

    /// The state shared by every torrent in the view, or `None` when the view
    /// is empty or mixes states.
    pub fn unique_state(&self) -> Option<TorrentState> {
        let mut states = self.torrents.values().map(|t| t.state);
        let first = states.next()?;
        states.all(|s| s == first).then_some(first)
    }

    /// Torrent ids in the view, sorted; used as row keys downstream.
    pub fn ids(&self) -> Vec<&str> {
        self.torrents.keys().map(String::as_str).collect()
    }

    /// `(id, torrent, label)` rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &Torrent, &str)> + '_ {
        self.torrents.iter().map(|(id, torrent)| {
            let label = self.labels.get(id).map(String::as_str).unwrap_or_default();
            (id.as_str(), torrent, label)
        })
    }
}
