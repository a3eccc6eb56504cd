//! Executors: the boundary layer.
//!
//! Executors are the only code in the crate allowed to block, open sockets,
//! touch the filesystem, or read a clock. They never mutate actor state
//! directly; completions re-enter the system as ordinary messages through
//! [`crate::runtime::RuntimeHandle::send`] — cyclic references between
//! actors are resolved by message passing, not shared pointers.

pub mod broadcast;
pub mod llm;
pub mod persistence;
pub mod tool;

use crate::effect::{BroadcastEvent, ToolCallRequest};
use crate::ids::{AgentId, ClientId, ReplyTag, RoomId};
use crate::values::{ChatMessage, RoomConfig, Task};
use async_trait::async_trait;

/// `DB_*` effects. Every method is a single statement or a
/// single batch; there is no cross-call transaction.
#[async_trait]
pub trait PersistenceExecutor: Send + Sync {
    async fn persist_message(&self, message: ChatMessage) -> Result<(), crate::error::RuntimeError>;
    async fn delete_room_messages(&self, room_id: RoomId) -> Result<(), crate::error::RuntimeError>;
    async fn upsert_room_config(&self, config: RoomConfig) -> Result<(), crate::error::RuntimeError>;
    async fn upsert_task(&self, project_room_id: RoomId, task: Task) -> Result<(), crate::error::RuntimeError>;
    async fn upsert_artifact(
        &self,
        room_id: RoomId,
        agent_id: String,
        path: String,
        content: String,
    ) -> Result<(), crate::error::RuntimeError>;
    async fn delete_artifact(&self, room_id: RoomId, agent_id: String, path: String) -> Result<(), crate::error::RuntimeError>;
    async fn load_artifact(&self, room_id: RoomId, agent_id: String, path: String) -> Result<Option<String>, crate::error::RuntimeError>;
    async fn load_messages(&self, room_id: RoomId, limit: usize) -> Result<Vec<ChatMessage>, crate::error::RuntimeError>;
}

/// `CALL_ANTHROPIC`/`CANCEL_API_CALL`.
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    /// Starts an LLM call in the background; the eventual `ApiResponse` or
    /// `ApiError` is enqueued to `agent:agent_id` tagged `reply_tag` via the
    /// runtime handle held by the concrete executor. Returns immediately.
    async fn call(&self, agent_id: AgentId, request: crate::effect::LlmRequest, reply_tag: ReplyTag);
    /// Aborts the in-flight HTTPS request for `reply_tag`, if any.
    async fn cancel(&self, reply_tag: ReplyTag);
}

/// `EXECUTE_TOOLS_BATCH`/`CANCEL_TOOL_EXECUTION`.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_batch(
        &self,
        agent_id: AgentId,
        room_id: Option<RoomId>,
        calls: Vec<ToolCallRequest>,
        reply_tag: ReplyTag,
    );
    async fn cancel(&self, reply_tag: ReplyTag);
}

/// `BROADCAST_TO_ROOM`/`BROADCAST_TO_ALL`/`SEND_TO_CLIENT`.
#[async_trait]
pub trait BroadcastExecutor: Send + Sync {
    async fn broadcast_to_room(&self, room_id: RoomId, event: BroadcastEvent);
    async fn broadcast_to_all(&self, event: BroadcastEvent);
    async fn send_to_client(&self, client_id: ClientId, event: BroadcastEvent);
}
