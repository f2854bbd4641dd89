#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use storm_proto::protocol::{
    SessionStatus, Torrent, TorrentLabels, TorrentState, Torrents, ViewTorrent, ViewUpdate,
};
use storm_sync::{Transport, TransportError, VersionToken, ViewFetch};

/// What the fake daemon answers to a combined view request.
#[derive(Debug, Clone)]
pub enum ViewReply {
    Modified {
        hashes: Vec<&'static str>,
        token: &'static str,
    },
    Unchanged,
    Fail(u16),
}

/// Scripted in-memory daemon.  Replies and delays are keyed by filter.
#[derive(Default)]
pub struct FakeTransport {
    views: Mutex<HashMap<Option<TorrentState>, ViewReply>>,
    delays: Mutex<HashMap<Option<TorrentState>, Duration>>,
    pub tokens_seen: Mutex<Vec<Option<String>>>,
    pub view_calls: AtomicUsize,

    torrents: Mutex<Torrents>,
    labels: Mutex<TorrentLabels>,
    pub fail_session: AtomicBool,
    pub torrents_calls: AtomicUsize,
    pub labels_calls: AtomicUsize,

    pub corpus: Mutex<Vec<String>>,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub assigned: Mutex<Vec<(String, String)>>,

    pub plugins: Mutex<Vec<String>>,
    pub enabled: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, filter: Option<TorrentState>, reply: ViewReply) {
        self.views.lock().unwrap().insert(filter, reply);
    }

    pub fn delay(&self, filter: Option<TorrentState>, delay: Duration) {
        self.delays.lock().unwrap().insert(filter, delay);
    }

    pub fn set_torrents(&self, entries: &[(&str, TorrentState, &str)]) {
        let mut torrents = self.torrents.lock().unwrap();
        let mut labels = self.labels.lock().unwrap();
        torrents.clear();
        labels.clear();
        for (id, state, label) in entries {
            torrents.insert(id.to_string(), torrent(*state));
            labels.insert(id.to_string(), label.to_string());
        }
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens_seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.view_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, filter: Option<TorrentState>) {
        let delay = self.delays.lock().unwrap().get(&filter).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn torrent(state: TorrentState) -> Torrent {
    Torrent {
        state,
        ..Torrent::default()
    }
}

fn failure(code: u16) -> TransportError {
    TransportError::Status {
        code,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_view(
        &self,
        token: Option<&VersionToken>,
        filter: Option<TorrentState>,
    ) -> Result<ViewFetch, TransportError> {
        self.view_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(token.map(|t| t.as_str().to_string()));
        self.pause(filter).await;

        let reply = self
            .views
            .lock()
            .unwrap()
            .get(&filter)
            .cloned()
            .unwrap_or(ViewReply::Fail(503));

        match reply {
            ViewReply::Modified { hashes, token } => Ok(ViewFetch::Modified {
                view: ViewUpdate {
                    torrents: hashes
                        .into_iter()
                        .map(|hash| ViewTorrent {
                            hash: hash.to_string(),
                            label: String::new(),
                            status: torrent(filter.unwrap_or(TorrentState::Seeding)),
                        })
                        .collect(),
                    session: SessionStatus::default(),
                    disk_free: 1024,
                },
                token: VersionToken::new(token),
            }),
            ViewReply::Unchanged => Ok(ViewFetch::Unchanged),
            ViewReply::Fail(code) => Err(failure(code)),
        }
    }

    async fn fetch_torrents(
        &self,
        filter: Option<TorrentState>,
    ) -> Result<Torrents, TransportError> {
        self.torrents_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(filter).await;
        let torrents = self.torrents.lock().unwrap().clone();
        Ok(torrents
            .into_iter()
            .filter(|(_, t)| filter.map_or(true, |state| t.state == state))
            .collect())
    }

    async fn fetch_torrent_labels(
        &self,
        _filter: Option<TorrentState>,
    ) -> Result<TorrentLabels, TransportError> {
        self.labels_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn fetch_session_status(&self) -> Result<SessionStatus, TransportError> {
        if self.fail_session.load(Ordering::SeqCst) {
            return Err(failure(500));
        }
        Ok(SessionStatus::default())
    }

    async fn fetch_free_space(&self) -> Result<i64, TransportError> {
        Ok(4096)
    }

    async fn fetch_label_corpus(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.corpus.lock().unwrap().clone())
    }

    async fn create_label(&self, name: &str) -> Result<(), TransportError> {
        self.created.lock().unwrap().push(name.to_string());
        self.corpus.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_label(&self, name: &str) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(name.to_string());
        self.corpus.lock().unwrap().retain(|l| l != name);
        Ok(())
    }

    async fn set_torrent_label(&self, id: &str, label: &str) -> Result<(), TransportError> {
        if !label.is_empty() && !self.corpus.lock().unwrap().iter().any(|l| l == label) {
            return Err(failure(400));
        }
        self.assigned
            .lock()
            .unwrap()
            .push((id.to_string(), label.to_string()));
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.plugins.lock().unwrap().clone())
    }

    async fn enable_plugin(&self, name: &str) -> Result<(), TransportError> {
        self.enabled.lock().unwrap().push(name.to_string());
        self.plugins.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
