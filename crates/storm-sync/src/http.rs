//! `Transport` over the storm REST API.
//!
//! Authorization lives here and nowhere else: a 401 makes the transport ask
//! its [`CredentialPrompt`] for an API key and replay the request with basic
//! auth, for as long as the daemon keeps refusing and the prompt keeps
//! answering.  Callers only ever see the eventual success or an ordinary error.
//!
//! The prompt runs in its own task.  A request that is dropped while waiting
//! for it (a superseded join, say) leaves the prompt running, and whoever
//! hits the next 401 waits for the same answer instead of asking again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ETAG;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use storm_proto::protocol::{
    ErrorResponse, SessionStatus, SetTorrentLabelRequest, TorrentLabels, TorrentState, Torrents,
    ViewUpdateResponse,
};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError, VersionToken, ViewFetch};

/// Supplies an API key when the daemon demands one.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// `None` means the user declined; the request then fails with
    /// `TransportError::AuthRequired`.
    async fn api_key(&self) -> Option<String>;
}

/// Answer of a prompt in progress: `None` until it settles, then the key
/// (or `None` when declined).
type PendingAnswer = watch::Receiver<Option<Option<String>>>;

#[derive(Default)]
struct AuthState {
    api_key: RwLock<Option<String>>,
    /// Set while a prompt task is running.
    pending: Mutex<Option<PendingAnswer>>,
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
    auth: Arc<AuthState>,
    prompt: Option<Arc<dyn CredentialPrompt>>,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url =
            Url::parse(base_url).map_err(|err| TransportError::Url(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Url(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            auth: Arc::new(AuthState::default()),
            prompt: None,
        })
    }

    pub fn with_api_key(self, key: Option<String>) -> Self {
        Self {
            auth: Arc::new(AuthState {
                api_key: RwLock::new(key),
                pending: Mutex::new(None),
            }),
            ..self
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, answering 401s through the prompt.
    async fn send<F>(&self, build: F) -> Result<Response, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        loop {
            let key = self.auth.api_key.read().await.clone();
            let mut request = build(&self.http);
            if let Some(key) = &key {
                request = request.basic_auth("", Some(key));
            }

            let response = request.send().await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return check_status(response).await;
            }

            let Some(prompt) = &self.prompt else {
                return Err(TransportError::AuthRequired);
            };
            if !self.await_new_key(prompt, key).await {
                return Err(TransportError::AuthRequired);
            }
        }
    }

    /// Wait until a key other than `rejected` is available, starting the
    /// prompt task if none is running.  `false` when the prompt declined.
    async fn await_new_key(
        &self,
        prompt: &Arc<dyn CredentialPrompt>,
        rejected: Option<String>,
    ) -> bool {
        let mut answer = {
            let mut pending = self.auth.pending.lock().await;
            if *self.auth.api_key.read().await != rejected {
                // Another request already obtained a new key.
                return true;
            }
            match pending.as_ref() {
                Some(answer) => answer.clone(),
                None => {
                    let answer = spawn_prompt(Arc::clone(&self.auth), Arc::clone(prompt));
                    *pending = Some(answer.clone());
                    answer
                }
            }
        };

        let supplied = answer
            .wait_for(Option::is_some)
            .await
            .map(|settled| matches!(*settled, Some(Some(_))));
        match supplied {
            Ok(true) => {
                info!("API key supplied, retrying request");
                true
            }
            Ok(false) => {
                warn!("API key prompt declined");
                false
            }
            Err(_) => {
                warn!("API key prompt ended without an answer");
                false
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        filter: Option<TorrentState>,
    ) -> Result<T, TransportError> {
        let url = self.endpoint(segments)?;
        let response = self
            .send(|http| with_filter(http.get(url.clone()), filter))
            .await?;
        decode(response).await
    }
}

/// Run `prompt` detached from any request, storing the key it supplies.
fn spawn_prompt(auth: Arc<AuthState>, prompt: Arc<dyn CredentialPrompt>) -> PendingAnswer {
    let (tx, rx) = watch::channel(None);
    tokio::spawn(async move {
        debug!("prompting for API key");
        let key = prompt.api_key().await;
        if let Some(key) = &key {
            *auth.api_key.write().await = Some(key.clone());
        }
        *auth.pending.lock().await = None;
        tx.send_replace(Some(key));
    });
    rx
}

fn with_filter(request: RequestBuilder, filter: Option<TorrentState>) -> RequestBuilder {
    match filter {
        Some(state) => request.query(&[("state", state.as_str())]),
        None => request,
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    Err(TransportError::Status {
        code: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_view(
        &self,
        token: Option<&VersionToken>,
        filter: Option<TorrentState>,
    ) -> Result<ViewFetch, TransportError> {
        let url = self.endpoint(&["view"])?;
        let response = self
            .send(|http| {
                let request = with_filter(http.get(url.clone()), filter);
                match token {
                    Some(token) => request.header(ETAG, token.as_str()),
                    None => request,
                }
            })
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("view not modified");
            return Ok(ViewFetch::Unchanged);
        }

        let body: ViewUpdateResponse = decode(response).await?;
        Ok(ViewFetch::Modified {
            view: body.update,
            token: VersionToken::new(body.etag),
        })
    }

    async fn fetch_torrents(
        &self,
        filter: Option<TorrentState>,
    ) -> Result<Torrents, TransportError> {
        self.get_json(&["torrents"], filter).await
    }

    async fn fetch_torrent_labels(
        &self,
        filter: Option<TorrentState>,
    ) -> Result<TorrentLabels, TransportError> {
        self.get_json(&["torrents", "labels"], filter).await
    }

    async fn fetch_session_status(&self) -> Result<SessionStatus, TransportError> {
        self.get_json(&["session"], None).await
    }

    async fn fetch_free_space(&self) -> Result<i64, TransportError> {
        self.get_json(&["session", "space"], None).await
    }

    async fn fetch_label_corpus(&self) -> Result<Vec<String>, TransportError> {
        self.get_json(&["labels"], None).await
    }

    async fn create_label(&self, name: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["labels", name])?;
        self.send(|http| http.post(url.clone())).await?;
        Ok(())
    }

    async fn delete_label(&self, name: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["labels", name])?;
        self.send(|http| http.delete(url.clone())).await?;
        Ok(())
    }

    async fn set_torrent_label(&self, id: &str, label: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["torrent", id, "label"])?;
        let body = SetTorrentLabelRequest {
            label: label.to_string(),
        };
        self.send(|http| http.post(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<String>, TransportError> {
        self.get_json(&["plugins"], None).await
    }

    async fn enable_plugin(&self, name: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["plugins", name])?;
        self.send(|http| http.post(url.clone())).await?;
        Ok(())
    }
}
