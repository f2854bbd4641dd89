//! Foreground/background signal of the consuming surface.
//!
//! One tracker is owned by whatever manages the surface's lifecycle; the host
//! feeds it events and everyone else subscribes.  No debouncing happens here.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle events delivered by the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The surface came to the foreground.
    Visible,
    /// The surface went to the background.
    Hidden,
    /// The surface is being torn down.  Some hosts send this instead of
    /// `Hidden`, so it must also stop polling.
    PageHide,
}

#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    tx: Arc<watch::Sender<bool>>,
}

impl VisibilityTracker {
    /// Starts visible.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn handle(&self, event: HostEvent) {
        let visible = matches!(event, HostEvent::Visible);
        debug!(?event, visible, "host visibility event");
        self.set_visible(visible);
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                return false;
            }
            *current = visible;
            true
        });
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_visible() {
        assert!(VisibilityTracker::new().is_visible());
    }

    #[test]
    fn test_page_hide_counts_as_hidden() {
        let tracker = VisibilityTracker::new();
        let rx = tracker.subscribe();

        tracker.handle(HostEvent::PageHide);
        assert!(!tracker.is_visible());
        assert!(!*rx.borrow());

        tracker.handle(HostEvent::Visible);
        assert!(tracker.is_visible());

        tracker.handle(HostEvent::Hidden);
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_repeated_event_does_not_notify() {
        let tracker = VisibilityTracker::new();
        let mut rx = tracker.subscribe();

        tracker.handle(HostEvent::Visible);
        assert!(!rx.has_changed().unwrap());

        tracker.handle(HostEvent::Hidden);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();
        tracker.handle(HostEvent::PageHide);
        assert!(!rx.has_changed().unwrap());
    }
}
