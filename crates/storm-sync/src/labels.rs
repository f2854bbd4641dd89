//! Label suggestions and edits for a single torrent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSuggestion {
    pub value: String,
    /// Not in the corpus yet; choosing it creates the label first.
    pub is_new: bool,
    /// Removes the torrent's label.
    pub is_clear: bool,
}

impl LabelSuggestion {
    pub fn existing(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_new: false,
            is_clear: false,
        }
    }

    pub fn new_label(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_new: true,
            is_clear: false,
        }
    }

    pub fn clear() -> Self {
        Self {
            value: String::new(),
            is_new: false,
            is_clear: true,
        }
    }
}

/// Suggestions for a query against the corpus, for a torrent currently
/// labelled `current` (`""` when unlabelled).
///
/// Corpus matches come first in corpus order, then the "new" entry, then the
/// "clear" entry.  The current label is never offered as a plain match.
pub fn suggest(corpus: &[String], query: &str, current: &str) -> Vec<LabelSuggestion> {
    let query = query.trim();
    let needle = query.to_lowercase();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut exact = !needle.is_empty() && current.to_lowercase() == needle;

    for label in corpus {
        if label.is_empty() || !seen.insert(label.as_str()) {
            continue;
        }
        let lower = label.to_lowercase();
        if !needle.is_empty() && lower == needle {
            exact = true;
        }
        if label == current {
            continue;
        }
        if needle.is_empty() || lower.contains(&needle) {
            out.push(LabelSuggestion::existing(label.as_str()));
        }
    }

    if !needle.is_empty() && !exact {
        out.push(LabelSuggestion::new_label(query));
    }
    if !current.is_empty() {
        out.push(LabelSuggestion::clear());
    }
    out
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inputs {
    corpus: Vec<String>,
    query: String,
    current: String,
}

/// Live suggestion list for one label-edit surface.  Every input change
/// recomputes the list before returning.
#[derive(Clone)]
pub struct LabelSuggestionEngine {
    inputs: Arc<Mutex<Inputs>>,
    tx: Arc<watch::Sender<Vec<LabelSuggestion>>>,
}

impl LabelSuggestionEngine {
    pub fn new(corpus: Vec<String>, current: impl Into<String>) -> Self {
        let inputs = Inputs {
            corpus,
            query: String::new(),
            current: current.into(),
        };
        let (tx, _rx) = watch::channel(suggest(&inputs.corpus, "", &inputs.current));
        Self {
            inputs: Arc::new(Mutex::new(inputs)),
            tx: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inputs> {
        self.inputs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut Inputs)) {
        let mut inputs = self.lock();
        f(&mut inputs);
        let next = suggest(&inputs.corpus, &inputs.query, &inputs.current);
        self.tx.send_if_modified(|list| {
            if *list == next {
                return false;
            }
            *list = next;
            true
        });
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.update(|inputs| inputs.query = query);
    }

    pub fn set_corpus(&self, corpus: Vec<String>) {
        self.update(|inputs| inputs.corpus = corpus);
    }

    pub fn set_current(&self, current: impl Into<String>) {
        let current = current.into();
        self.update(|inputs| inputs.current = current);
    }

    pub fn current(&self) -> String {
        self.lock().current.clone()
    }

    pub fn suggestions(&self) -> Vec<LabelSuggestion> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<LabelSuggestion>> {
        self.tx.subscribe()
    }

    /// Reload the corpus from the daemon.
    pub async fn refresh(&self, transport: &dyn Transport) -> Result<(), TransportError> {
        let corpus = transport.fetch_label_corpus().await?;
        debug!(labels = corpus.len(), "Label corpus refreshed");
        self.set_corpus(corpus);
        Ok(())
    }
}

// ── Editor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelChange {
    Unchanged,
    Assigned(String),
    Cleared,
}

/// Commits label choices to the daemon.
#[derive(Clone)]
pub struct LabelEditor {
    transport: Arc<dyn Transport>,
    /// Pause between creating a label and assigning it.
    settle: Duration,
}

impl LabelEditor {
    pub fn new(transport: Arc<dyn Transport>, settle: Duration) -> Self {
        Self { transport, settle }
    }

    /// Apply `choice` to torrent `id`, keeping `engine` in step.
    pub async fn apply(
        &self,
        id: &str,
        engine: &LabelSuggestionEngine,
        choice: &LabelSuggestion,
    ) -> Result<LabelChange, TransportError> {
        let current = engine.current();
        if choice.value == current {
            return Ok(LabelChange::Unchanged);
        }

        if choice.is_new {
            self.transport.create_label(&choice.value).await?;
            tokio::time::sleep(self.settle).await;
        }

        self.transport.set_torrent_label(id, &choice.value).await?;
        info!(torrent = id, label = %choice.value, "Label assigned");
        engine.set_current(choice.value.as_str());

        if choice.is_new {
            engine.refresh(self.transport.as_ref()).await?;
        }

        if choice.value.is_empty() {
            Ok(LabelChange::Cleared)
        } else {
            Ok(LabelChange::Assigned(choice.value.clone()))
        }
    }

    pub async fn create(
        &self,
        name: &str,
        engine: &LabelSuggestionEngine,
    ) -> Result<(), TransportError> {
        self.transport.create_label(name).await?;
        engine.refresh(self.transport.as_ref()).await
    }

    pub async fn delete(
        &self,
        name: &str,
        engine: &LabelSuggestionEngine,
    ) -> Result<(), TransportError> {
        self.transport.delete_label(name).await?;
        engine.refresh(self.transport.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_query_with_current_label() {
        let got = suggest(&corpus(&["movies", "music"]), "mo", "music");
        assert_eq!(
            got,
            vec![
                LabelSuggestion::existing("movies"),
                LabelSuggestion::new_label("mo"),
                LabelSuggestion::clear(),
            ]
        );
    }

    #[test]
    fn test_empty_query_unlabelled() {
        let got = suggest(&corpus(&["movies", "music"]), "", "");
        assert_eq!(
            got,
            vec![
                LabelSuggestion::existing("movies"),
                LabelSuggestion::existing("music"),
            ]
        );
    }

    #[test]
    fn test_exact_match_suppresses_new() {
        let got = suggest(&corpus(&["Movies", "music"]), "movies", "");
        assert_eq!(got, vec![LabelSuggestion::existing("Movies")]);
    }

    #[test]
    fn test_query_equal_to_current_is_not_new() {
        let got = suggest(&corpus(&["movies", "music"]), "Music", "music");
        assert_eq!(got, vec![LabelSuggestion::clear()]);
    }

    #[test]
    fn test_duplicates_and_blanks_skipped() {
        let got = suggest(&corpus(&["tv", "", "tv", "linux"]), "", "");
        assert_eq!(
            got,
            vec![
                LabelSuggestion::existing("tv"),
                LabelSuggestion::existing("linux"),
            ]
        );
    }

    #[test]
    fn test_new_entry_keeps_raw_case() {
        let got = suggest(&corpus(&["movies"]), "Docs", "");
        assert_eq!(got, vec![LabelSuggestion::new_label("Docs")]);
    }

    #[test]
    fn test_engine_recomputes_on_input_change() {
        let engine = LabelSuggestionEngine::new(corpus(&["movies", "music"]), "");
        let mut rx = engine.subscribe();
        assert_eq!(engine.suggestions().len(), 2);

        engine.set_query("mus");
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            vec![
                LabelSuggestion::existing("music"),
                LabelSuggestion::new_label("mus"),
            ]
        );

        engine.set_corpus(corpus(&["music", "musicals"]));
        assert_eq!(
            engine.suggestions(),
            vec![
                LabelSuggestion::existing("music"),
                LabelSuggestion::existing("musicals"),
                LabelSuggestion::new_label("mus"),
            ]
        );

        // Same result after trimming, no notification.
        let _ = rx.borrow_and_update();
        engine.set_query("mus ");
        assert!(!rx.has_changed().unwrap());

        engine.set_query("music");
        assert_eq!(
            *rx.borrow_and_update(),
            vec![
                LabelSuggestion::existing("music"),
                LabelSuggestion::existing("musicals"),
            ]
        );
    }
}
