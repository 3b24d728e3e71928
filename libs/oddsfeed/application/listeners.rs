//! Subscriber registries
//!
//! Listeners are shared trait objects; `subscribe` hands back an id that
//! `unsubscribe` takes. Notification order between listeners is unspecified.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type ListenerId = u64;

pub struct ListenerRegistry<L: ?Sized> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<L>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, listener));
        id
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Call `notify` for every listener, outside the registry lock
    pub fn for_each(&self, mut notify: impl FnMut(&L)) {
        let listeners: Vec<Arc<L>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            notify(listener);
        }
    }
}
