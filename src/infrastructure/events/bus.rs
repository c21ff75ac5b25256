use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::{SchaltEvent, SchaltEventKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Kinds(HashSet<SchaltEventKind>),
}

impl EventFilter {
    pub fn kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = SchaltEventKind>,
    {
        EventFilter::Kinds(kinds.into_iter().collect())
    }

    fn accepts(&self, kind: SchaltEventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

struct Subscriber {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<SchaltEvent>,
}

type Registry = RwLock<BTreeMap<u64, Subscriber>>;

/// Typed fan-out of backend push events. Every subscriber receives matching
/// events in publish order on its own unbounded queue.
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Arc<Registry>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .insert(id, Subscriber { filter, sender });
        debug!("Registered event subscription {id}");
        EventSubscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, event: SchaltEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.filter.accepts(kind) {
                    continue;
                }
                if subscriber.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            warn!(
                "Dropping {} closed subscription(s) while publishing {}",
                closed.len(),
                kind.as_str()
            );
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Receiving half of a subscription. Dropping it unregisters the subscriber.
pub struct EventSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<SchaltEvent>,
    registry: Weak<Registry>,
}

impl EventSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<SchaltEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SchaltEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.write().remove(&self.id);
            debug!("Unregistered event subscription {}", self.id);
        }
    }
}
