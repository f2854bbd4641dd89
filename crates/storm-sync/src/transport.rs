//! The seam between the sync engine and the network.
//!
//! Everything the engine needs from the daemon goes through [`Transport`].
//! The engine never interprets status codes itself: any `Err` is a transport
//! failure, and authorization prompts are the implementation's business.

use async_trait::async_trait;
use storm_proto::protocol::{SessionStatus, TorrentLabels, TorrentState, Torrents, ViewUpdate};
use thiserror::Error;

/// Opaque change-detection tag handed out with every full view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a combined view fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewFetch {
    Modified { view: ViewUpdate, token: VersionToken },
    /// The view is identical to the one tagged by the token that was sent.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("daemon returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("authorization required")]
    AuthRequired,
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint url: {0}")]
    Url(String),
}

impl TransportError {
    /// HTTP status code, when the daemon produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(err) => err.status().map(|s| s.as_u16()),
            TransportError::Status { code, .. } => Some(*code),
            TransportError::AuthRequired => Some(401),
            TransportError::Decode(_) | TransportError::Url(_) => None,
        }
    }
}

/// Remote operations of the storm API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Full view in one request.  `token` is the tag of the view currently on
    /// screen; when the daemon's view still matches it, `Unchanged` comes back.
    async fn fetch_view(
        &self,
        token: Option<&VersionToken>,
        filter: Option<TorrentState>,
    ) -> Result<ViewFetch, TransportError>;

    async fn fetch_torrents(&self, filter: Option<TorrentState>)
        -> Result<Torrents, TransportError>;

    async fn fetch_torrent_labels(
        &self,
        filter: Option<TorrentState>,
    ) -> Result<TorrentLabels, TransportError>;

    async fn fetch_session_status(&self) -> Result<SessionStatus, TransportError>;

    /// Free bytes in the daemon's download location.
    async fn fetch_free_space(&self) -> Result<i64, TransportError>;

    async fn fetch_label_corpus(&self) -> Result<Vec<String>, TransportError>;

    async fn create_label(&self, name: &str) -> Result<(), TransportError>;

    async fn delete_label(&self, name: &str) -> Result<(), TransportError>;

    async fn set_torrent_label(&self, id: &str, label: &str) -> Result<(), TransportError>;

    async fn list_plugins(&self) -> Result<Vec<String>, TransportError>;

    async fn enable_plugin(&self, name: &str) -> Result<(), TransportError>;
}
