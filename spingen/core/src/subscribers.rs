//! Catalog Subscribers
//!
//! Ordered list of long-lived listeners for readiness and every discovery the
//! client sees. Subscribers are added and removed explicitly; each one gets
//! its own unbounded channel, so a slow reader never stalls the pump.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::model::{Skin, Spray};

/// Event delivered to subscribers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogEvent {
    /// The worker is ready; carries the default sprays
    Ready(Vec<Spray>),
    /// A spray was discovered by some load
    Spray(Spray),
    /// A skin was discovered by some load
    Skin(Skin),
}

/// Identifies a subscription for removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<CatalogEvent>,
}

impl Subscription {
    /// Id to pass to `unsubscribe`
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event; `None` once unsubscribed or the client is gone
    pub async fn recv(&mut self) -> Option<CatalogEvent> {
        self.events.recv().await
    }

    /// Next event if one is queued
    pub fn try_recv(&mut self) -> Option<CatalogEvent> {
        self.events.try_recv().ok()
    }
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<CatalogEvent>)>,
    /// Replayed to anyone subscribing after readiness
    ready: Option<Vec<Spray>>,
}

/// Subscriber registry
#[derive(Default)]
pub struct Subscribers {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl Subscribers {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber at the end of the list
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, events) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock();
        if let Some(sprays) = &inner.ready {
            let _ = tx.send(CatalogEvent::Ready(sprays.clone()));
        }
        inner.subscribers.push((id, tx));

        Subscription { id, events }
    }

    /// Remove a subscriber; returns whether it was present
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Record readiness and tell every subscriber; later calls are ignored
    pub fn ready(&self, sprays: &[Spray]) {
        let mut inner = self.inner.lock();
        if inner.ready.is_some() {
            tracing::warn!("Duplicate ready ignored");
            return;
        }
        inner.ready = Some(sprays.to_vec());
        Self::deliver(&mut inner, &CatalogEvent::Ready(sprays.to_vec()));
    }

    /// Tell every subscriber about a discovery
    pub fn publish(&self, event: CatalogEvent) {
        Self::deliver(&mut self.inner.lock(), &event);
    }

    /// Number of live subscribers
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Whether nobody is subscribed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send in list order, dropping subscribers whose receiver is gone
    fn deliver(inner: &mut Inner, event: &CatalogEvent) {
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}
