//! Live-view synchronization for the storm torrent daemon.
//!
//! A [`PollingCoordinator`] keeps an immutable [`Snapshot`] of the daemon's
//! torrents current while the surface is visible, a [`ConnectivityPresenter`]
//! turns its health into a debounced status affordance, and the label types
//! drive a label-edit surface.

pub mod connectivity;
pub mod engine;
pub mod gate;
pub mod http;
pub mod join;
pub mod labels;
pub mod plugins;
pub mod poller;
pub mod snapshot;
pub mod transport;
pub mod visibility;

pub use connectivity::{Affordance, ConnectivityPresenter};
pub use engine::SyncEngine;
pub use gate::IncrementalDiffGate;
pub use http::{CredentialPrompt, HttpTransport};
pub use join::{JoinError, JoinOutcome, SnapshotJoiner};
pub use labels::{suggest, LabelChange, LabelEditor, LabelSuggestion, LabelSuggestionEngine};
pub use plugins::{AutoEnable, NeverEnable, PluginGate, PluginPrompt, PluginStatus};
pub use poller::{PollerConfig, PollerHandle, PollingCoordinator, SyncView};
pub use snapshot::Snapshot;
pub use transport::{Transport, TransportError, VersionToken, ViewFetch};
pub use visibility::{HostEvent, VisibilityTracker};
