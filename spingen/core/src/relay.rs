//! Event Relay
//!
//! Delivers discoveries streamed during an archive load to the observer that
//! started the load. Scopes are keyed by the load's [`Seq`], so concurrent
//! loads never see each other's discoveries, and a scope closed at settlement
//! never fires again.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use crate::engine::Discovery;
use crate::messages::Seq;

/// Per-load discovery observer
pub type DiscoveryObserver = Box<dyn FnMut(&Discovery) + Send>;

/// Counts of what one load relayed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Sprays discovered
    pub sprays: usize,
    /// Skins discovered
    pub skins: usize,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sprays, {} skins", self.sprays, self.skins)
    }
}

struct LoadScope {
    observer: Option<DiscoveryObserver>,
    summary: LoadSummary,
}

/// Routes tagged discoveries to their load scope
#[derive(Default)]
pub struct EventRelay {
    scopes: Mutex<HashMap<Seq, LoadScope>>,
}

impl EventRelay {
    /// Create a relay with no open scopes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the scope for a load before its request is posted
    pub fn open(&self, seq: Seq, observer: Option<DiscoveryObserver>) {
        let previous = self.scopes.lock().insert(
            seq,
            LoadScope {
                observer,
                summary: LoadSummary::default(),
            },
        );
        if previous.is_some() {
            tracing::warn!(%seq, "Load scope reopened");
        }
    }

    /// Deliver one discovery to its scope
    ///
    /// Returns `false` (and logs) if no scope is open for `seq`.
    pub fn relay(&self, seq: Seq, discovery: &Discovery) -> bool {
        let mut scopes = self.scopes.lock();
        let Some(scope) = scopes.get_mut(&seq) else {
            drop(scopes);
            tracing::warn!(%seq, "Discovery for a load that isn't in progress");
            return false;
        };

        match discovery {
            Discovery::Spray(_) => scope.summary.sprays += 1,
            Discovery::Skin(_) => scope.summary.skins += 1,
        }
        if let Some(observer) = scope.observer.as_mut() {
            observer(discovery);
        }
        true
    }

    /// Close the scope of a settled load
    pub fn close(&self, seq: Seq) -> Option<LoadSummary> {
        self.scopes.lock().remove(&seq).map(|scope| scope.summary)
    }

    /// Close every scope (worker gone)
    pub fn clear(&self) {
        self.scopes.lock().clear();
    }

    /// Number of loads in progress
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.scopes.lock().len()
    }
}

impl fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRelay")
            .field("open_scopes", &self.open_scopes())
            .finish()
    }
}
