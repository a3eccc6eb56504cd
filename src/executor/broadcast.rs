//! WebSocket fan-out executor.
//!
//! Holds no socket itself — a connection adapter registers an
//! [`mpsc::UnboundedSender`] per connected client and is responsible for
//! forwarding whatever arrives on the paired receiver onto the wire. This
//! executor only tracks which room (if any) each client is watching and
//! fans events out, pruning senders whose receiver has already dropped.

use crate::effect::BroadcastEvent;
use crate::ids::{ClientId, RoomId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

struct ClientHandle {
    room_id: Option<RoomId>,
    sender: mpsc::UnboundedSender<BroadcastEvent>,
}

/// Registry of connected clients, keyed by the id the adapter assigned at
/// connect time.
pub struct ClientRegistryBroadcastExecutor {
    clients: Mutex<HashMap<ClientId, ClientHandle>>,
}

impl Default for ClientRegistryBroadcastExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistryBroadcastExecutor {
    pub fn new() -> Self {
        Self { clients: Mutex::new(HashMap::new()) }
    }

    /// Registers a client watching `room_id` (`None` for connections not yet
    /// attached to a room, e.g. the director's status stream).
    pub fn register(&self, client_id: ClientId, room_id: Option<RoomId>) -> mpsc::UnboundedReceiver<BroadcastEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.lock().expect("client registry poisoned").insert(client_id, ClientHandle { room_id, sender });
        receiver
    }

    pub fn unregister(&self, client_id: &ClientId) {
        self.clients.lock().expect("client registry poisoned").remove(client_id);
    }

    pub fn set_room(&self, client_id: &ClientId, room_id: Option<RoomId>) {
        if let Some(handle) = self.clients.lock().expect("client registry poisoned").get_mut(client_id) {
            handle.room_id = room_id;
        }
    }

    pub fn connected_count(&self) -> usize {
        self.clients.lock().expect("client registry poisoned").len()
    }
}

#[async_trait]
impl super::BroadcastExecutor for ClientRegistryBroadcastExecutor {
    async fn broadcast_to_room(&self, room_id: RoomId, event: BroadcastEvent) {
        let mut clients = self.clients.lock().expect("client registry poisoned");
        clients.retain(|_, handle| {
            if handle.room_id.as_ref() != Some(&room_id) {
                return true;
            }
            handle.sender.send(event.clone()).is_ok()
        });
    }

    async fn broadcast_to_all(&self, event: BroadcastEvent) {
        let mut clients = self.clients.lock().expect("client registry poisoned");
        clients.retain(|_, handle| handle.sender.send(event.clone()).is_ok());
    }

    async fn send_to_client(&self, client_id: ClientId, event: BroadcastEvent) {
        let mut clients = self.clients.lock().expect("client registry poisoned");
        let dead = match clients.get(&client_id) {
            Some(handle) => handle.sender.send(event).is_err(),
            None => return,
        };
        if dead {
            clients.remove(&client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: &str) -> BroadcastEvent {
        BroadcastEvent { kind: kind.to_string(), room_id: None, payload: serde_json::json!({}) }
    }

    #[tokio::test]
    async fn broadcast_to_room_reaches_only_matching_clients() {
        use super::super::BroadcastExecutor;
        let executor = ClientRegistryBroadcastExecutor::new();
        let mut in_room = executor.register(ClientId::new("c1"), Some(RoomId::new("r1")));
        let mut other_room = executor.register(ClientId::new("c2"), Some(RoomId::new("r2")));

        executor.broadcast_to_room(RoomId::new("r1"), event("chat_message")).await;

        assert!(in_room.try_recv().is_ok());
        assert!(other_room.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_client_is_pruned_on_next_broadcast() {
        use super::super::BroadcastExecutor;
        let executor = ClientRegistryBroadcastExecutor::new();
        {
            let _receiver = executor.register(ClientId::new("c1"), None);
        }
        assert_eq!(executor.connected_count(), 1);
        executor.broadcast_to_all(event("ping")).await;
        assert_eq!(executor.connected_count(), 0);
    }

    #[tokio::test]
    async fn send_to_client_delivers_single_event() {
        use super::super::BroadcastExecutor;
        let executor = ClientRegistryBroadcastExecutor::new();
        let mut receiver = executor.register(ClientId::new("c1"), None);
        executor.send_to_client(ClientId::new("c1"), event("status")).await;
        let received = receiver.try_recv().unwrap();
        assert_eq!(received.kind, "status");
    }
}
