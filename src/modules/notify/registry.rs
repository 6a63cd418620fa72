use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::dto::UserMessage;

/// One live websocket, reduced to the sender half of its outbound frame
/// queue. The socket task owns the receiver and the socket itself; when it
/// goes away the sender reports closed and the registry prunes the entry.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

impl ClientConnection {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Live connections per user, shared between the websocket accept path and
/// the result bus listener. A user may hold any number of simultaneous
/// connections (several tabs, several devices).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    active: DashMap<Uuid, Vec<ClientConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    pub fn connect(&self, user_id: Uuid, connection: ClientConnection) {
        self.active.entry(user_id).or_default().push(connection);
    }

    pub fn disconnect(&self, user_id: Uuid, connection_id: Uuid) {
        if let Some(mut connections) = self.active.get_mut(&user_id) {
            connections.retain(|c| c.id != connection_id);
            let empty = connections.is_empty();
            drop(connections);
            if empty {
                self.active.remove_if(&user_id, |_, remaining| remaining.is_empty());
            }
        }
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.active.get(&user_id).map_or(0, |c| c.len())
    }

    /// Serializes the frame once and enqueues it to every live connection of
    /// the user. Connections found closed or rejecting the frame are removed;
    /// the others are untouched. No-op for users with no connections.
    pub fn send_to_user(&self, user_id: Uuid, message: &UserMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize frame for user {}: {}", user_id, e);
                return;
            }
        };

        let Some(mut connections) = self.active.get_mut(&user_id) else {
            return;
        };

        let mut stale: Vec<Uuid> = Vec::new();
        for connection in connections.iter() {
            if connection.is_closed() {
                stale.push(connection.id);
                continue;
            }
            if connection
                .tx
                .send(Message::Text(payload.clone().into()))
                .is_err()
            {
                warn!("Failed to enqueue frame for user {}", user_id);
                stale.push(connection.id);
            }
        }

        if !stale.is_empty() {
            debug!(
                "Removing {} stale connection(s) for user {}",
                stale.len(),
                user_id
            );
            connections.retain(|c| !stale.contains(&c.id));
        }

        let empty = connections.is_empty();
        drop(connections);
        if empty {
            self.active.remove_if(&user_id, |_, remaining| remaining.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::render::events::ResultStatus;
    use crate::modules::sources::model::SourceKind;

    fn frame() -> UserMessage {
        UserMessage {
            message: "Your canvas has been successfully rendered.".to_string(),
            video_url: Some("http://media.example.com/a_Demo.mp4".to_string()),
            source_id: Uuid::new_v4(),
            source_type: SourceKind::Canvas,
            status: ResultStatus::Success,
            detail: None,
        }
    }

    #[test]
    fn send_without_connections_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.send_to_user(Uuid::new_v4(), &frame());
    }

    #[test]
    fn fanout_reaches_live_connections_and_prunes_failed_ones() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        registry.connect(user, ClientConnection::new(tx1));
        registry.connect(user, ClientConnection::new(tx2));
        registry.connect(user, ClientConnection::new(tx3));
        assert_eq!(registry.connection_count(user), 3);

        // One client goes away without deregistering
        drop(rx2);

        registry.send_to_user(user, &frame());

        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert_eq!(registry.connection_count(user), 2);

        // Survivors keep receiving on the next fanout
        registry.send_to_user(user, &frame());
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert_eq!(registry.connection_count(user), 2);
    }

    #[test]
    fn fanout_is_scoped_to_the_addressed_user() {
        let registry = ConnectionRegistry::new();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.connect(user_a, ClientConnection::new(tx_a));
        registry.connect(user_b, ClientConnection::new(tx_b));

        registry.send_to_user(user_a, &frame());

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn disconnect_removes_exactly_one_connection() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let first = ClientConnection::new(tx1);
        let first_id = first.id;

        registry.connect(user, first);
        registry.connect(user, ClientConnection::new(tx2));

        registry.disconnect(user, first_id);
        assert_eq!(registry.connection_count(user), 1);

        // Unknown ids are ignored
        registry.disconnect(user, Uuid::new_v4());
        assert_eq!(registry.connection_count(user), 1);
    }

    #[test]
    fn last_disconnect_drops_the_user_entry() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = ClientConnection::new(tx);
        let id = connection.id;
        registry.connect(user, connection);

        registry.disconnect(user, id);
        assert_eq!(registry.connection_count(user), 0);
        assert!(registry.active.get(&user).is_none());
    }

    #[test]
    fn all_connections_failing_empties_the_registry_for_the_user() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        registry.connect(user, ClientConnection::new(tx1));
        registry.connect(user, ClientConnection::new(tx2));

        drop(rx1);
        drop(rx2);

        registry.send_to_user(user, &frame());
        assert_eq!(registry.connection_count(user), 0);
        assert!(registry.active.get(&user).is_none());
    }
}
