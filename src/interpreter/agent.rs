//! Agent interpreter.
//!
//! ```text
//! idle ──Respond──▶ thinking ──ApiResponse(text)──▶ speaking ──emit──▶ idle
//!                      │                                    │
//!                      │ ApiResponse(tool_use) ──▶ awaiting_tools ──ToolResult──▶ thinking
//!                      │
//!                      └ ApiError ──▶ idle (with broadcast of failure)
//! ```

use crate::effect::{ActorMessageEnvelope, BroadcastEvent, Effect, LlmMessage, LlmRequest, LlmRole, ToolCallRequest};
use crate::error::Severity;
use crate::ids::{AgentId, MessageId, ReplyTag, RoomId, TaskId};
use crate::interpreter::{no_change, state_only, with_effects};
use crate::values::agent::{ConversationTurn, TurnRole};
use crate::values::message::{ChatMessage, MessageType};
use crate::values::{AgentState, AgentStatus};

/// Maximum retries for a transient `ApiError`.
pub const MAX_API_RETRIES: u32 = 3;
const RETRY_BASE_MS: u64 = 1_000;
const RETRY_CAP_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ServerToolUse { id: String, name: String, input: serde_json::Value },
    WebSearchToolResult { tool_use_id: String, content: serde_json::Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
}

#[derive(Debug, Clone)]
pub enum AgentMessage {
    RespondToMessage {
        room_id: RoomId,
        context: Vec<ChatMessage>,
        trigger: ChatMessage,
        reply_tag: ReplyTag,
    },
    ApiResponse {
        content: Vec<ContentBlock>,
        stop_reason: StopReason,
        usage: crate::values::TokenUsage,
        reply_tag: ReplyTag,
        /// Minted by the LLM executor when the response arrives, for the
        /// `AgentResponseMsg` this turn may produce.
        response_message_id: MessageId,
        now_ms: i64,
    },
    ToolResults {
        results: Vec<crate::effect::ToolCallOutcome>,
        reply_tag: ReplyTag,
    },
    ApiError {
        message: String,
        transient: bool,
        reply_tag: ReplyTag,
    },
    /// Internal: the scheduler re-delivers this after an exponential
    /// backoff window following a transient `ApiError`.
    RetryApiCall {
        reply_tag: ReplyTag,
    },
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom,
    SetStatus {
        status: AgentStatus,
    },
    StartTask {
        task_id: TaskId,
    },
    CompleteTask,
    ResetAgent,
}

fn transcript_line(msg: &ChatMessage) -> String {
    let marker = match msg.message_type {
        MessageType::System | MessageType::Join | MessageType::Leave => "***",
        _ => "",
    };
    format!("[{}] {}{} {}", msg.timestamp_ms, marker, msg.sender_name, msg.content).trim().to_string()
}

fn build_transcript(context: &[ChatMessage], topic: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(t) = topic {
        lines.push(format!("(room topic: {t})"));
    }
    for msg in context {
        lines.push(transcript_line(msg));
    }
    lines.join("\n")
}

fn build_system_prompt(config: &crate::values::agent::AgentConfig) -> String {
    let mut parts = config.system_prompt_fragments.clone();
    if !config.personality_traits.is_empty() {
        let mut traits: Vec<String> = config
            .personality_traits
            .iter()
            .map(|(k, v)| format!("{k}={v:.2}"))
            .collect();
        traits.sort();
        parts.push(format!("personality traits: {}", traits.join(", ")));
    }
    parts.join("\n\n")
}

fn declared_tools(config: &crate::values::agent::AgentConfig) -> Vec<crate::tool_protocol::ToolMetadata> {
    crate::tool_protocol::builtin_tools()
        .into_iter()
        .filter(|t| config.allows_tool(&t.name))
        .collect()
}

fn build_request(state: &AgentState, context: &[ChatMessage], trigger: Option<&ChatMessage>) -> LlmRequest {
    let mut messages: Vec<LlmMessage> = Vec::new();
    if state.pending_turns.is_empty() {
        let transcript = build_transcript(context, None);
        let user_content = match trigger {
            Some(trigger) => format!("{transcript}\n\n{}", transcript_line(trigger)),
            None => transcript,
        };
        messages.push(LlmMessage { role: LlmRole::User, content: user_content });
    } else {
        for turn in &state.pending_turns {
            let role = match turn.role {
                TurnRole::User => LlmRole::User,
                TurnRole::Assistant => LlmRole::Assistant,
                TurnRole::ToolResult => LlmRole::Tool,
            };
            messages.push(LlmMessage { role, content: turn.content.clone() });
        }
    }

    LlmRequest {
        model: state.config.model.clone(),
        max_tokens: 4096,
        system: build_system_prompt(&state.config),
        messages,
        tools: declared_tools(&state.config),
        temperature: state.config.temperature,
    }
}

fn backoff_ms(retry_count: u32) -> u64 {
    (RETRY_BASE_MS.saturating_mul(1u64 << retry_count.min(5))).min(RETRY_CAP_MS)
}

fn typing_effect(room_id: &RoomId, agent_id: &AgentId, typing: bool) -> Effect {
    Effect::BroadcastToRoom {
        room_id: room_id.clone(),
        event: BroadcastEvent {
            kind: "agent_typing".to_string(),
            room_id: Some(room_id.clone()),
            payload: serde_json::json!({"agentId": agent_id, "typing": typing}),
        },
    }
}

pub fn interpret(mut state: AgentState, message: AgentMessage) -> (AgentState, Vec<Effect>) {
    match message {
        AgentMessage::RespondToMessage { room_id, context, trigger, reply_tag } => {
            let mut effects = Vec::new();
            if !matches!(state.status, AgentStatus::Idle) {
                if let Some(old_tag) = state.current_reply_tag.clone() {
                    effects.push(Effect::CancelApiCall { reply_tag: old_tag.clone() });
                    if matches!(state.status, AgentStatus::AwaitingTools) {
                        effects.push(Effect::CancelToolExecution { reply_tag: old_tag });
                    }
                }
            }

            state.room_id = Some(room_id.clone());
            state.status = AgentStatus::Thinking;
            state.tool_call_count = 0;
            state.api_retry_count = 0;
            state.pending_turns.clear();
            state.current_reply_tag = Some(reply_tag.clone());

            let request = build_request(&state, &context, Some(&trigger));
            effects.push(typing_effect(&room_id, &state.config.id, true));
            effects.push(Effect::CallAnthropic { agent_id: state.config.id.clone(), request, reply_tag });

            with_effects(state, effects)
        }

        AgentMessage::ApiResponse { content, stop_reason, usage, reply_tag, response_message_id, now_ms } => {
            if state.current_reply_tag.as_ref() != Some(&reply_tag) {
                return no_change(state);
            }
            state.last_token_usage = Some(state.last_token_usage.unwrap_or_default().add(usage));

            let assistant_summary = serde_json::to_string(&format_blocks(&content)).unwrap_or_default();
            state.pending_turns.push(ConversationTurn { role: TurnRole::Assistant, content: assistant_summary });

            match stop_reason {
                StopReason::ToolUse => {
                    state.tool_call_count += 1;
                    if state.tool_call_count > state.max_tool_calls {
                        let room_id = state.room_id.clone();
                        state.reset_to_idle();
                        let mut effects = Vec::new();
                        if let Some(room_id) = room_id {
                            effects.push(budget_exceeded_notice(&room_id, &state.config.id));
                        }
                        return with_effects(state, effects);
                    }

                    let calls: Vec<ToolCallRequest> = content
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::ToolUse { id, name, input } => Some(ToolCallRequest {
                                call_id: id.clone(),
                                tool_name: name.clone(),
                                parameters: input.clone(),
                            }),
                            _ => None,
                        })
                        .collect();

                    state.status = AgentStatus::AwaitingTools;
                    let room_id = state.room_id.clone();
                    let agent_id = state.config.id.clone();
                    with_effects(
                        state,
                        vec![Effect::ExecuteToolsBatch { agent_id, room_id, calls, reply_tag }],
                    )
                }

                StopReason::EndTurn => {
                    let text = content
                        .into_iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");

                    let room_id = state.room_id.clone();
                    let agent_id = state.config.id.clone();
                    let sender_name = state.config.name.clone();
                    state.reset_to_idle();
                    state.last_spoke_at_ms = Some(now_ms);
                    state.message_count += 1;

                    let mut effects = Vec::new();
                    if let Some(room_id) = room_id {
                        let response = ChatMessage::new(
                            response_message_id,
                            room_id.clone(),
                            crate::ids::SenderId::Agent(agent_id.clone()),
                            sender_name,
                            text,
                            MessageType::Chat,
                            now_ms,
                            None,
                            Vec::new(),
                            Vec::new(),
                        );
                        effects.push(Effect::SendToActor {
                            to: crate::ids::ActorAddress::room(&room_id),
                            message: ActorMessageEnvelope::Room(super::room::RoomMessage::AgentResponse {
                                agent_id: agent_id.clone(),
                                message: response,
                            }),
                        });
                        effects.push(typing_effect(&room_id, &agent_id, false));
                    }
                    with_effects(state, effects)
                }
            }
        }

        AgentMessage::ToolResults { results, reply_tag } => {
            if state.current_reply_tag.as_ref() != Some(&reply_tag) {
                return no_change(state);
            }
            for result in &results {
                state.pending_turns.push(ConversationTurn {
                    role: TurnRole::ToolResult,
                    content: serde_json::to_string(result).unwrap_or_default(),
                });
            }
            state.status = AgentStatus::Thinking;

            let request = build_request(&state, &[], None);
            let agent_id = state.config.id.clone();
            with_effects(state, vec![Effect::CallAnthropic { agent_id, request, reply_tag }])
        }

        AgentMessage::ApiError { message, transient, reply_tag } => {
            if state.current_reply_tag.as_ref() != Some(&reply_tag) {
                return no_change(state);
            }
            if transient && state.api_retry_count < MAX_API_RETRIES {
                let delay_ms = backoff_ms(state.api_retry_count);
                state.api_retry_count += 1;
                let agent_id = state.config.id.clone();
                with_effects(
                    state,
                    vec![Effect::ScheduleMessage {
                        id: format!("retry:{reply_tag}"),
                        to: crate::ids::ActorAddress::agent(&agent_id),
                        message: ActorMessageEnvelope::Agent(AgentMessage::RetryApiCall { reply_tag }),
                        delay_ms,
                        recurring: false,
                    }],
                )
            } else {
                let room_id = state.room_id.clone();
                let agent_id = state.config.id.clone();
                state.reset_to_idle();
                let mut effects = Vec::new();
                if let Some(room_id) = room_id {
                    effects.push(Effect::BroadcastToRoom {
                        room_id: room_id.clone(),
                        event: BroadcastEvent {
                            kind: "system_notification".to_string(),
                            room_id: Some(room_id),
                            payload: serde_json::json!({
                                "severity": Severity::Error,
                                "message": format!("agent {agent_id} failed: {message}"),
                            }),
                        },
                    });
                }
                with_effects(state, effects)
            }
        }

        AgentMessage::RetryApiCall { reply_tag } => {
            if state.current_reply_tag.as_ref() != Some(&reply_tag) {
                return no_change(state);
            }
            let request = build_request(&state, &[], None);
            let agent_id = state.config.id.clone();
            with_effects(state, vec![Effect::CallAnthropic { agent_id, request, reply_tag }])
        }

        AgentMessage::JoinRoom { room_id } => {
            state.room_id = Some(room_id);
            state_only(state)
        }
        AgentMessage::LeaveRoom => {
            state.room_id = None;
            state_only(state)
        }
        AgentMessage::SetStatus { status } => {
            state.status = status;
            state_only(state)
        }
        AgentMessage::StartTask { task_id } => {
            state.task_id = Some(task_id);
            state_only(state)
        }
        AgentMessage::CompleteTask => {
            state.task_id = None;
            state_only(state)
        }
        AgentMessage::ResetAgent => {
            state.reset_to_idle();
            state_only(state)
        }
    }
}

fn format_blocks(content: &[ContentBlock]) -> Vec<serde_json::Value> {
    content
        .iter()
        .map(|b| match b {
            ContentBlock::Text { text } => serde_json::json!({"type": "text", "text": text}),
            ContentBlock::ToolUse { id, name, input } => {
                serde_json::json!({"type": "tool_use", "id": id, "name": name, "input": input})
            }
            ContentBlock::ServerToolUse { id, name, input } => {
                serde_json::json!({"type": "server_tool_use", "id": id, "name": name, "input": input})
            }
            ContentBlock::WebSearchToolResult { tool_use_id, content } => {
                serde_json::json!({"type": "web_search_tool_result", "tool_use_id": tool_use_id, "content": content})
            }
        })
        .collect()
}

fn budget_exceeded_notice(room_id: &RoomId, agent_id: &AgentId) -> Effect {
    Effect::BroadcastToRoom {
        room_id: room_id.clone(),
        event: BroadcastEvent {
            kind: "system_notification".to_string(),
            room_id: Some(room_id.clone()),
            payload: serde_json::json!({
                "severity": Severity::Error,
                "message": format!("agent {agent_id} exceeded its tool-call budget"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::agent::AgentConfig;

    fn idle_agent(max_tool_calls: u32) -> AgentState {
        AgentState::new(AgentConfig::new(AgentId::new("a"), "Ada"), max_tool_calls)
    }

    fn trigger(room_id: &str) -> ChatMessage {
        ChatMessage::new(
            MessageId::new("trig"),
            RoomId::new(room_id),
            crate::ids::SenderId::User(crate::ids::UserId::new("u1")),
            "user",
            "hi",
            MessageType::Chat,
            1_000,
            None,
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn respond_to_message_starts_thinking_and_calls_llm() {
        let state = idle_agent(50);
        let (next, effects) = interpret(
            state,
            AgentMessage::RespondToMessage {
                room_id: RoomId::new("r1"),
                context: Vec::new(),
                trigger: trigger("r1"),
                reply_tag: ReplyTag::new(),
            },
        );
        assert_eq!(next.status, AgentStatus::Thinking);
        assert!(effects.iter().any(|e| matches!(e, Effect::CallAnthropic { .. })));
    }

    #[test]
    fn new_respond_supersedes_prior_call() {
        let tag1 = ReplyTag::new();
        let mut state = idle_agent(50);
        state.status = AgentStatus::Thinking;
        state.current_reply_tag = Some(tag1.clone());

        let (next, effects) = interpret(
            state,
            AgentMessage::RespondToMessage {
                room_id: RoomId::new("r1"),
                context: Vec::new(),
                trigger: trigger("r1"),
                reply_tag: ReplyTag::new(),
            },
        );

        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CancelApiCall { reply_tag } if *reply_tag == tag1)));
        assert_ne!(next.current_reply_tag, Some(tag1));
    }

    #[test]
    fn stale_api_response_is_ignored() {
        let mut state = idle_agent(50);
        state.status = AgentStatus::Thinking;
        state.current_reply_tag = Some(ReplyTag::new());

        let (next, effects) = interpret(
            state.clone(),
            AgentMessage::ApiResponse {
                content: vec![ContentBlock::Text { text: "hi".to_string() }],
                stop_reason: StopReason::EndTurn,
                usage: Default::default(),
                reply_tag: ReplyTag::new(),
                response_message_id: MessageId::new("m"),
                now_ms: 2_000,
            },
        );
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn budget_exceeded_on_third_tool_use_round() {
        let tag = ReplyTag::new();
        let mut state = idle_agent(2);
        state.status = AgentStatus::Thinking;
        state.room_id = Some(RoomId::new("r1"));
        state.current_reply_tag = Some(tag.clone());
        state.tool_call_count = 2;

        let (next, effects) = interpret(
            state,
            AgentMessage::ApiResponse {
                content: vec![ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "bash".to_string(),
                    input: serde_json::json!({"command": "echo hi"}),
                }],
                stop_reason: StopReason::ToolUse,
                usage: Default::default(),
                reply_tag: tag,
                response_message_id: MessageId::new("m"),
                now_ms: 2_000,
            },
        );

        assert_eq!(next.status, AgentStatus::Idle);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::BroadcastToRoom { event, .. } if event.kind == "system_notification")));
    }
}
