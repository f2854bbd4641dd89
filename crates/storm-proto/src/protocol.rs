use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Torrent states as reported by the daemon.  Serialized by name, which is
/// also the value of the `state` filter query parameter.  `ALL` lists the
/// filterable states; `Unknown` only comes back from newer daemons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TorrentState {
    Active,
    Allocating,
    Checking,
    Downloading,
    Seeding,
    Paused,
    Error,
    #[default]
    Queued,
    Moving,
    /// Any state this client does not know; never sent as a filter.
    #[serde(other)]
    Unknown,
}

impl TorrentState {
    pub const ALL: [TorrentState; 9] = [
        TorrentState::Active,
        TorrentState::Allocating,
        TorrentState::Checking,
        TorrentState::Downloading,
        TorrentState::Seeding,
        TorrentState::Paused,
        TorrentState::Error,
        TorrentState::Queued,
        TorrentState::Moving,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Active => "Active",
            TorrentState::Allocating => "Allocating",
            TorrentState::Checking => "Checking",
            TorrentState::Downloading => "Downloading",
            TorrentState::Seeding => "Seeding",
            TorrentState::Paused => "Paused",
            TorrentState::Error => "Error",
            TorrentState::Queued => "Queued",
            TorrentState::Moving => "Moving",
            TorrentState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TorrentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TorrentState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown torrent state: {s}"))
    }
}

/// Status record of a single torrent.  Every field defaults so that older
/// daemons omitting a key still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Torrent {
    pub name: String,
    pub state: TorrentState,
    /// 0.0 - 100.0
    pub progress: f64,
    pub ratio: f64,
    #[serde(rename = "ETA")]
    pub eta: f64,
    pub active_time: i64,
    pub completed_time: i64,
    pub time_added: f64,
    pub seeding_time: i64,
    pub distributed_copies: f64,
    pub is_finished: bool,
    pub is_seed: bool,
    pub private: bool,
    pub download_location: String,
    pub download_payload_rate: i64,
    pub upload_payload_rate: i64,
    pub next_announce: i64,
    pub num_peers: i64,
    pub num_seeds: i64,
    pub num_pieces: i64,
    pub piece_length: i64,
    pub total_done: i64,
    pub total_peers: i64,
    pub total_seeds: i64,
    pub total_size: i64,
    pub tracker_host: String,
    pub tracker_status: String,
    pub file_priorities: Vec<i64>,
    pub file_progress: Vec<f64>,
}

/// Torrent id (info hash) → torrent status.
pub type Torrents = HashMap<String, Torrent>;

/// Torrent id → label.  Torrents without a label map to `""` or are absent.
pub type TorrentLabels = HashMap<String, String>;

/// Session-wide transfer statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionStatus {
    pub has_incoming_connections: bool,
    pub upload_rate: f64,
    pub download_rate: f64,
    pub payload_upload_rate: f64,
    pub payload_download_rate: f64,
    pub total_download: i64,
    pub total_upload: i64,
    pub num_peers: i64,
    pub dht_nodes: i64,
}

/// One row of the combined view: the torrent status flattened together with
/// its hash and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewTorrent {
    pub hash: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub status: Torrent,
}

/// Everything the dashboard polls, fetched in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ViewUpdate {
    #[serde(default)]
    pub torrents: Vec<ViewTorrent>,
    #[serde(default)]
    pub session: SessionStatus,
    #[serde(default)]
    pub disk_free: i64,
}

/// `ViewUpdate` plus the version tag the daemon computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewUpdateResponse {
    #[serde(flatten)]
    pub update: ViewUpdate,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetTorrentLabelRequest {
    pub label: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub error: String,
}
