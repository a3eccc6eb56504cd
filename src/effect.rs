//! Effects as data.
//!
//! An [`Effect`] is a plain record describing a side effect the runtime
//! should perform after an interpreter returns; interpreters never execute
//! them. Every effect belongs to exactly one [`EffectCategory`], which the
//! dispatcher uses to route and batch (DB before actor-sends
//! before LLM/tool before broadcast).

use crate::ids::{ActorAddress, AgentId, ClientId, ReplyTag, RoomId};
use crate::values::{ChatMessage, RoomConfig, Task};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCategory {
    Persistence,
    Llm,
    Tool,
    Broadcast,
    ActorControl,
}

/// A single tool invocation requested by the LLM inside one `ApiResponse`.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Provider-assigned id for this specific call, used to correlate the
    /// `tool_result` turn back to the `tool_use` block.
    pub call_id: String,
    pub tool_name: String,
    pub parameters: JsonValue,
}

/// One executed tool result, paired back to its originating call id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub output: JsonValue,
}

/// An LLM chat-completion request in an API-agnostic abstracted shape.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<crate::tool_protocol::ToolMetadata>,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

/// A WebSocket event envelope; `kind` is the JSON `type` tag.
#[derive(Debug, Clone)]
pub struct BroadcastEvent {
    pub kind: String,
    pub room_id: Option<RoomId>,
    pub payload: JsonValue,
}

#[derive(Debug, Clone)]
pub enum Effect {
    // ---- Persistence ------------------------------------------------
    PersistMessage { message: ChatMessage },
    DeleteRoomMessages { room_id: RoomId },
    UpsertRoomConfig { config: RoomConfig },
    UpsertTask { project_room_id: RoomId, task: Task },
    UpsertArtifact { room_id: RoomId, agent_id: String, path: String, content: String },
    DeleteArtifact { room_id: RoomId, agent_id: String, path: String },
    /// Requests a reload of a room's persisted messages; the executor
    /// replies with `MessagesLoaded` addressed to `reply_to` tagged
    /// `reply_tag`.
    LoadMessages { room_id: RoomId, limit: usize, reply_to: ActorAddress, reply_tag: ReplyTag },

    // ---- LLM ----------------------------------------------------------
    CallAnthropic { agent_id: AgentId, request: LlmRequest, reply_tag: ReplyTag },
    CancelApiCall { reply_tag: ReplyTag },

    // ---- Tool -----------------------------------------------------------
    ExecuteToolsBatch {
        agent_id: AgentId,
        room_id: Option<RoomId>,
        calls: Vec<ToolCallRequest>,
        reply_tag: ReplyTag,
    },
    CancelToolExecution { reply_tag: ReplyTag },

    // ---- Broadcast ------------------------------------------------------
    BroadcastToRoom { room_id: RoomId, event: BroadcastEvent },
    BroadcastToAll { event: BroadcastEvent },
    SendToClient { client_id: ClientId, event: BroadcastEvent },

    // ---- Actor control --------------------------------------------------
    SendToActor { to: ActorAddress, message: ActorMessageEnvelope },
    ScheduleMessage {
        id: String,
        to: ActorAddress,
        message: ActorMessageEnvelope,
        delay_ms: u64,
        recurring: bool,
    },
    CancelScheduled { id: String },
    SpawnRoomActor { config: RoomConfig },
    SpawnAgentActor { config: crate::values::AgentConfig },
    SpawnProjectActor { project: crate::values::ProjectState },
    StopActor { address: ActorAddress },
}

impl Effect {
    pub fn category(&self) -> EffectCategory {
        match self {
            Effect::PersistMessage { .. }
            | Effect::DeleteRoomMessages { .. }
            | Effect::UpsertRoomConfig { .. }
            | Effect::UpsertTask { .. }
            | Effect::UpsertArtifact { .. }
            | Effect::DeleteArtifact { .. }
            | Effect::LoadMessages { .. } => EffectCategory::Persistence,

            Effect::CallAnthropic { .. } | Effect::CancelApiCall { .. } => EffectCategory::Llm,

            Effect::ExecuteToolsBatch { .. } | Effect::CancelToolExecution { .. } => {
                EffectCategory::Tool
            }

            Effect::BroadcastToRoom { .. }
            | Effect::BroadcastToAll { .. }
            | Effect::SendToClient { .. } => EffectCategory::Broadcast,

            Effect::SendToActor { .. }
            | Effect::ScheduleMessage { .. }
            | Effect::CancelScheduled { .. }
            | Effect::SpawnRoomActor { .. }
            | Effect::SpawnAgentActor { .. }
            | Effect::SpawnProjectActor { .. }
            | Effect::StopActor { .. } => EffectCategory::ActorControl,
        }
    }
}

/// Opaque wrapper so `Effect::SendToActor`/`ScheduleMessage` can carry any of
/// the four actor-kind message enums without the effect module depending on
/// all of `interpreter::*`. The runtime downcasts via the `kind` tag before
/// dispatching to the matching interpreter.
#[derive(Debug, Clone)]
pub enum ActorMessageEnvelope {
    Room(crate::interpreter::room::RoomMessage),
    Agent(crate::interpreter::agent::AgentMessage),
    Project(crate::interpreter::project::ProjectMessage),
    Director(crate::interpreter::director::DirectorMessage),
}
