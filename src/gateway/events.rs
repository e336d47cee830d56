use crate::gateway::protocol::ConversationEvent;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Broadcasts conversation events to all connected gateway clients
pub struct EventBroadcaster {
    clients: DashMap<String, mpsc::Sender<ConversationEvent>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Subscribe a new client and return (client_id, receiver)
    pub fn subscribe(&self) -> (String, mpsc::Receiver<ConversationEvent>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(100);
        self.clients.insert(client_id.clone(), tx);
        log::debug!("Client {} subscribed to events", client_id);
        (client_id, rx)
    }

    /// Unsubscribe a client
    pub fn unsubscribe(&self, client_id: &str) {
        self.clients.remove(client_id);
        log::debug!("Client {} unsubscribed from events", client_id);
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: ConversationEvent) {
        let mut failed_clients = Vec::new();

        for entry in self.clients.iter() {
            // Client channel full or closed
            if entry.value().try_send(event.clone()).is_err() {
                failed_clients.push(entry.key().clone());
            }
        }

        for client_id in failed_clients {
            self.clients.remove(&client_id);
            log::debug!("Removed disconnected client {}", client_id);
        }
    }

    /// Get the number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
