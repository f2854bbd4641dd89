//! Version-token bookkeeping for incremental view fetches.

use tracing::debug;

use crate::transport::VersionToken;

/// Holds the tag of the snapshot currently on screen.
///
/// The baseline is dropped whenever a join fails, so the fetch that brings the
/// connection back is always a full one and the health False→True edge never
/// rests on a stale tag.
#[derive(Debug, Default)]
pub struct IncrementalDiffGate {
    baseline: Option<VersionToken>,
}

impl IncrementalDiffGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag to send with the next fetch; `None` forces a full fetch.
    pub fn token(&self) -> Option<VersionToken> {
        self.baseline.clone()
    }

    /// A full fetch was committed.  Strategies without tags pass `None`.
    pub fn record(&mut self, token: Option<VersionToken>) {
        self.baseline = token;
    }

    pub fn invalidate(&mut self) {
        if self.baseline.take().is_some() {
            debug!("version baseline cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let mut gate = IncrementalDiffGate::new();
        assert_eq!(gate.token(), None);

        gate.record(Some(VersionToken::new("t1")));
        assert_eq!(gate.token(), Some(VersionToken::new("t1")));

        gate.invalidate();
        assert_eq!(gate.token(), None);

        gate.record(Some(VersionToken::new("t2")));
        gate.record(None);
        assert_eq!(gate.token(), None);
    }
}
