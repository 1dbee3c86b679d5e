use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::types::{Address, ChainId};

/// Notification pushed by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountsChanged(_) => "accountsChanged",
            Self::ChainChanged(_) => "chainChanged",
        }
    }
}

/// Listener registry shared between a provider and its subscribers.
#[derive(Debug, Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, UnboundedSender<ProviderEvent>>>,
}

impl EventEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a listener; it stays registered until the returned guard drops.
    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners.lock().insert(id, sender);
        debug!(listener = id, "provider listener registered");
        EventSubscription {
            id,
            emitter: Arc::downgrade(self),
            receiver,
        }
    }

    pub fn emit(&self, event: ProviderEvent) {
        let mut listeners = self.listeners.lock();
        debug!(event = event.name(), listeners = listeners.len(), "provider event");
        listeners.retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn remove(&self, id: u64) {
        if self.listeners.lock().remove(&id).is_some() {
            debug!(listener = id, "provider listener removed");
        }
    }
}

/// Scoped provider subscription; dropping it removes the listener.
#[derive(Debug)]
pub struct EventSubscription {
    id: u64,
    emitter: Weak<EventEmitter>,
    receiver: UnboundedReceiver<ProviderEvent>,
}

impl EventSubscription {
    /// Returns the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<ProviderEvent> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the next event; `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<ProviderEvent> {
        self.receiver.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.upgrade() {
            emitter.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_every_live_subscription() {
        let emitter = EventEmitter::new();
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();
        emitter.emit(ProviderEvent::ChainChanged(1337));
        assert_eq!(first.try_next(), Some(ProviderEvent::ChainChanged(1337)));
        assert_eq!(second.try_next(), Some(ProviderEvent::ChainChanged(1337)));
        assert_eq!(first.try_next(), None);
    }

    #[test]
    fn dropping_subscription_unregisters_listener() {
        let emitter = EventEmitter::new();
        let subscription = emitter.subscribe();
        assert_eq!(emitter.listener_count(), 1);
        drop(subscription);
        assert_eq!(emitter.listener_count(), 0);
        emitter.emit(ProviderEvent::AccountsChanged(Vec::new()));
    }

    #[tokio::test]
    async fn next_waits_for_emitted_event() {
        let emitter = EventEmitter::new();
        let mut subscription = emitter.subscribe();
        let producer = Arc::clone(&emitter);
        tokio::spawn(async move {
            producer.emit(ProviderEvent::AccountsChanged(vec![Address::new([7u8; 20])]));
        });
        assert_eq!(
            subscription.next().await,
            Some(ProviderEvent::AccountsChanged(vec![Address::new([7u8; 20])]))
        );
    }
}
