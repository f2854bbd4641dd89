//! Connection-status affordance.
//!
//! Turns the coordinator's health signal into what a display layer shows:
//! a banner that appears as soon as the daemon is lost, stays up for a grace
//! period after it comes back, then animates closed.  A new health edge
//! always wins over a pending hide.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affordance {
    #[default]
    Hidden,
    ShowingSteady,
    /// Closing animation running; becomes `Hidden` when it ends.
    ClosingAnimated,
}

impl Affordance {
    pub fn is_visible(self) -> bool {
        !matches!(self, Affordance::Hidden)
    }

    pub fn is_closing(self) -> bool {
        matches!(self, Affordance::ClosingAnimated)
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Bumped on every health edge; a timer only acts while its epoch is current.
    epoch: u64,
    last_health: Option<bool>,
    timer: Option<AbortHandle>,
}

#[derive(Clone)]
pub struct ConnectivityPresenter {
    grace: Duration,
    closing: Duration,
    inner: Arc<Mutex<Inner>>,
    tx: Arc<watch::Sender<Affordance>>,
}

impl ConnectivityPresenter {
    pub fn new(grace: Duration, closing: Duration) -> Self {
        let (tx, _rx) = watch::channel(Affordance::Hidden);
        Self {
            grace,
            closing,
            inner: Arc::new(Mutex::new(Inner::default())),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Affordance> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> Affordance {
        *self.tx.borrow()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed one health evaluation.  Must be called inside a tokio runtime.
    pub fn observe(&self, healthy: bool) {
        let mut inner = self.lock();
        match inner.last_health {
            // Nothing to announce when the first thing we learn is "fine".
            None if healthy => {
                inner.last_health = Some(true);
                return;
            }
            Some(previous) if previous == healthy => return,
            _ => {}
        }

        inner.last_health = Some(healthy);
        inner.epoch += 1;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        debug!(healthy, epoch = inner.epoch, "Connectivity edge");
        self.tx.send_if_modified(|state| {
            let changed = *state != Affordance::ShowingSteady;
            *state = Affordance::ShowingSteady;
            changed
        });

        if healthy {
            inner.timer = Some(self.schedule_hide(inner.epoch));
        }
    }

    fn schedule_hide(&self, epoch: u64) -> AbortHandle {
        let presenter = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(presenter.grace).await;
            if !presenter.advance(epoch, Affordance::ClosingAnimated) {
                return;
            }
            tokio::time::sleep(presenter.closing).await;
            if presenter.advance(epoch, Affordance::Hidden) {
                presenter.lock().timer = None;
            }
        });
        task.abort_handle()
    }

    /// Publish `next` unless a newer edge has arrived since `epoch`.
    fn advance(&self, epoch: u64, next: Affordance) -> bool {
        let inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        self.tx.send_replace(next);
        true
    }

    /// Follow a health channel until its sender goes away.
    pub fn drive(&self, mut health: watch::Receiver<bool>) -> JoinHandle<()> {
        let presenter = self.clone();
        tokio::spawn(async move {
            loop {
                let healthy = *health.borrow_and_update();
                presenter.observe(healthy);
                if health.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
