//! Agent persona definition and runtime state.

use crate::ids::{AgentId, ReplyTag, RoomId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated token accounting for one LLM round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(self, other: TokenUsage) -> Self {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

/// Persona definition for an agent, loaded from YAML by an out-of-core
/// adapter and handed to the director at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub system_prompt_fragments: Vec<String>,
    /// Trait name -> strength in [0, 1], e.g. `"curious" -> 0.8`.
    pub personality_traits: HashMap<String, f64>,
    pub response_tendency: f64,
    pub temperature: f64,
    pub model: String,
    pub tool_allow_list: Option<Vec<String>>,
}

impl AgentConfig {
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            system_prompt_fragments: Vec::new(),
            personality_traits: HashMap::new(),
            response_tendency: 0.5,
            temperature: 0.7,
            model: "claude-haiku-4-5-20251001".to_string(),
            tool_allow_list: None,
        }
    }

    /// Whether `tool_name` is permitted for this persona — `None` means all
    /// registered tools are permitted.
    pub fn allows_tool(&self, tool_name: &str) -> bool {
        match &self.tool_allow_list {
            None => true,
            Some(allowed) => allowed.iter().any(|t| t == tool_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Thinking,
    AwaitingTools,
    Speaking,
    Offline,
}

/// One turn of an agent's rolling conversation history (used to rebuild the
/// LLM request across tool-use iterations within a single response cycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ToolResult,
}

/// Runtime state owned exclusively by one `agent:<id>` actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub config: AgentConfig,
    pub status: AgentStatus,
    pub room_id: Option<RoomId>,
    pub task_id: Option<TaskId>,
    /// Bounded rolling history for the in-flight response cycle; cleared on
    /// transition back to idle.
    pub pending_turns: Vec<ConversationTurn>,
    pub history_cap: usize,
    pub tool_call_count: u32,
    pub max_tool_calls: u32,
    pub last_spoke_at_ms: Option<i64>,
    pub message_count: u64,
    pub last_token_usage: Option<TokenUsage>,
    /// The reply tag for the currently in-flight LLM/tool call, if any.
    /// A response or result carrying any other tag is stale and dropped.
    pub current_reply_tag: Option<ReplyTag>,
    pub api_retry_count: u32,
}

impl AgentState {
    pub fn new(config: AgentConfig, max_tool_calls: u32) -> Self {
        Self {
            config,
            status: AgentStatus::Idle,
            room_id: None,
            task_id: None,
            pending_turns: Vec::new(),
            history_cap: 20,
            tool_call_count: 0,
            max_tool_calls,
            last_spoke_at_ms: None,
            message_count: 0,
            last_token_usage: None,
            current_reply_tag: None,
            api_retry_count: 0,
        }
    }

    pub fn reset_to_idle(&mut self) {
        self.status = AgentStatus::Idle;
        self.pending_turns.clear();
        self.tool_call_count = 0;
        self.current_reply_tag = None;
        self.api_retry_count = 0;
    }
}
