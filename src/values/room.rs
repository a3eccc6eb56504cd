//! Room configuration and runtime state.

use crate::ids::AgentId;
use crate::ids::RoomId;
use crate::values::message::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Messages retained in a room's in-memory ring buffer; the database
/// remains the source of truth beyond this window.
pub const ROOM_RING_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub topic: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Idle,
    Active,
    Processing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub config: RoomConfig,
    pub members: BTreeSet<AgentId>,
    pub messages: VecDeque<ChatMessage>,
    pub phase: RoomPhase,
    pub pending_responders: BTreeSet<AgentId>,
    /// Millisecond timestamp each pending responder started waiting at, used
    /// by `RoomTick` to enforce the response timeout.
    pub pending_since_ms: std::collections::BTreeMap<AgentId, i64>,
}

impl RoomState {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            members: BTreeSet::new(),
            messages: VecDeque::new(),
            phase: RoomPhase::Idle,
            pending_responders: BTreeSet::new(),
            pending_since_ms: std::collections::BTreeMap::new(),
        }
    }

    /// Append to the ring buffer, discarding the oldest message once at
    /// capacity — the database retains all of them regardless.
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.messages.len() >= ROOM_RING_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn recent_context(&self, n: usize) -> Vec<ChatMessage> {
        let len = self.messages.len();
        let start = len.saturating_sub(n);
        self.messages.iter().skip(start).cloned().collect()
    }
}
