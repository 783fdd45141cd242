// src/reload/registry.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use super::ReloadMessage;

/// Identifier handed out by [`ClientRegistry::connect`].
pub type ClientId = u64;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: ClientId,
    clients: HashMap<ClientId, mpsc::UnboundedSender<ReloadMessage>>,
}

/// The set of connected browsers.
///
/// This is the only mutable state shared between the watch loop and the
/// reload server.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    state: Mutex<RegistryState>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a client; messages for it arrive on the returned receiver.
    pub fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<ReloadMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.clients.insert(id, tx);
        debug!(client = id, connected = state.clients.len(), "reload client connected");
        (id, rx)
    }

    /// Forget a client. Returns whether it was connected.
    pub fn disconnect(&self, id: ClientId) -> bool {
        let mut state = self.lock();
        let removed = state.clients.remove(&id).is_some();
        if removed {
            debug!(client = id, connected = state.clients.len(), "reload client disconnected");
        }
        removed
    }

    /// Send `message` to every client, pruning those whose receiver is gone.
    ///
    /// Returns the number of clients reached.
    pub fn broadcast(&self, message: &ReloadMessage) -> usize {
        let mut state = self.lock();
        state
            .clients
            .retain(|_, tx| tx.send(message.clone()).is_ok());
        state.clients.len()
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_all_and_prunes_dropped() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.connect();
        let (_b, rx_b) = registry.connect();
        let (c, mut rx_c) = registry.connect();

        drop(rx_b);
        assert!(registry.disconnect(c));
        assert!(!registry.disconnect(c));

        assert_eq!(registry.broadcast(&ReloadMessage::Reload), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(rx_a.try_recv().unwrap(), ReloadMessage::Reload);
        assert!(rx_c.try_recv().is_err());
    }
}
