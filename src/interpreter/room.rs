//! Room interpreter.

use crate::effect::{BroadcastEvent, Effect};
use crate::ids::AgentId;
use crate::interpreter::{no_change, state_only, with_effects};
use crate::values::message::MessageType;
use crate::values::{ChatMessage, RoomState};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// How long a room waits for a selected responder before giving up
/// (pending-responder timeout: 30s).
pub const PENDING_RESPONDER_TIMEOUT_MS: i64 = 30_000;

#[derive(Debug, Clone)]
pub enum RoomMessage {
    UserMessage {
        message: ChatMessage,
        /// Agent names explicitly `@mentioned`, already resolved to ids by
        /// the caller (the room has no name table of its own).
        mentioned_agents: Vec<AgentId>,
        /// Display name and configured `response_tendency` for every room
        /// member other than the sender, snapshotted by the runtime at
        /// enqueue time so the interpreter stays pure. The name travels
        /// alongside the tendency because `select_responders` needs it to
        /// break ties deterministically — `AgentId` itself carries no name
        /// information.
        member_tendencies: BTreeMap<AgentId, (String, f64)>,
        tendency_threshold: f64,
        fanout_cap: usize,
        context_window: usize,
    },
    AgentResponse {
        agent_id: AgentId,
        message: ChatMessage,
    },
    AgentJoined {
        agent_id: AgentId,
        agent_name: String,
        at_ms: i64,
        system_message_id: crate::ids::MessageId,
    },
    AgentLeft {
        agent_id: AgentId,
        agent_name: String,
        at_ms: i64,
        system_message_id: crate::ids::MessageId,
    },
    AgentTyping {
        agent_id: AgentId,
        typing: bool,
    },
    ClearMessages,
    ResetRoom,
    MessagesLoaded {
        messages: Vec<ChatMessage>,
    },
    RoomTick {
        now_ms: i64,
    },
    RequestResponses {
        trigger: ChatMessage,
        agent_ids: Vec<AgentId>,
        context_window: usize,
    },
}

/// Deterministic unit-interval score for "would `agent_id` respond to
/// `message_id`" — seeded by `(message id,
/// agent id)` so tests are reproducible.
fn tendency_roll(message_id: &str, agent_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    hasher.update(b":");
    hasher.update(agent_id.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest is 32 bytes");
    (u64::from_be_bytes(bytes) as f64) / (u64::MAX as f64)
}

/// Responder selection, pure given the tendency
/// snapshot carried on the message.
fn select_responders(
    message_id: &str,
    member_tendencies: &BTreeMap<AgentId, (String, f64)>,
    mentioned: &[AgentId],
    threshold: f64,
    fanout_cap: usize,
) -> Vec<AgentId> {
    if !mentioned.is_empty() {
        return mentioned.to_vec();
    }

    let mut scored: Vec<(AgentId, String, f64)> = member_tendencies
        .iter()
        .map(|(id, (name, configured))| {
            (id.clone(), name.clone(), tendency_roll(message_id, id.as_str()) * configured)
        })
        .collect();
    // Sort by score descending; ties broken by agent display name ascending,
    // not by AgentId, which carries no name information of its own.
    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.1.cmp(&b.1))
    });

    let qualifying: Vec<AgentId> = scored
        .iter()
        .filter(|(_, _, score)| *score > threshold)
        .take(fanout_cap)
        .map(|(id, _, _)| id.clone())
        .collect();

    if !qualifying.is_empty() {
        return qualifying;
    }

    scored.into_iter().next().map(|(id, _, _)| vec![id]).unwrap_or_default()
}

fn context_window(state: &RoomState, n: usize) -> Vec<ChatMessage> {
    state.recent_context(n)
}

fn send_respond_to(
    agent_id: &AgentId,
    room_id: &crate::ids::RoomId,
    context: Vec<ChatMessage>,
    trigger: ChatMessage,
) -> Effect {
    // Derived from the trigger message's own id rather than freshly
    // generated: interpreters may not use randomness, and every distinct
    // trigger already carries a unique id stamped by the runtime.
    let reply_tag = crate::ids::ReplyTag(format!("resp:{}", trigger.id));
    Effect::SendToActor {
        to: crate::ids::ActorAddress::agent(agent_id),
        message: crate::effect::ActorMessageEnvelope::Agent(
            super::agent::AgentMessage::RespondToMessage {
                room_id: room_id.clone(),
                context,
                trigger,
                reply_tag,
            },
        ),
    }
}

fn message_added_event(message: &ChatMessage) -> BroadcastEvent {
    BroadcastEvent {
        kind: "message_added".to_string(),
        room_id: Some(message.room_id.clone()),
        payload: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
    }
}

pub fn interpret(mut state: RoomState, message: RoomMessage) -> (RoomState, Vec<Effect>) {
    match message {
        RoomMessage::UserMessage {
            message: msg,
            mentioned_agents,
            member_tendencies,
            tendency_threshold,
            fanout_cap,
            context_window: ctx_n,
        } => {
            let responders = select_responders(
                msg.id.as_str(),
                &member_tendencies,
                &mentioned_agents,
                tendency_threshold,
                fanout_cap,
            );

            state.push_message(msg.clone());
            state.phase = crate::values::RoomPhase::Processing;
            state.pending_responders = responders.iter().cloned().collect();
            state.pending_since_ms = responders.iter().map(|a| (a.clone(), msg.timestamp_ms)).collect();

            let ctx = context_window(&state, ctx_n);
            let room_id = state.config.id.clone();

            let mut effects = vec![
                Effect::PersistMessage { message: msg.clone() },
                Effect::BroadcastToRoom { room_id: room_id.clone(), event: message_added_event(&msg) },
            ];
            for agent_id in &responders {
                effects.push(send_respond_to(agent_id, &room_id, ctx.clone(), msg.clone()));
            }

            with_effects(state, effects)
        }

        RoomMessage::RequestResponses { trigger, agent_ids, context_window: ctx_n } => {
            state.phase = crate::values::RoomPhase::Processing;
            state.pending_responders = agent_ids.iter().cloned().collect();
            state.pending_since_ms =
                agent_ids.iter().map(|a| (a.clone(), trigger.timestamp_ms)).collect();

            let ctx = context_window(&state, ctx_n);
            let room_id = state.config.id.clone();
            let effects = agent_ids
                .iter()
                .map(|agent_id| send_respond_to(agent_id, &room_id, ctx.clone(), trigger.clone()))
                .collect();

            with_effects(state, effects)
        }

        RoomMessage::AgentResponse { agent_id, message: msg } => {
            state.push_message(msg.clone());
            state.pending_responders.remove(&agent_id);
            state.pending_since_ms.remove(&agent_id);
            if state.pending_responders.is_empty() {
                state.phase = crate::values::RoomPhase::Active;
            }
            let room_id = state.config.id.clone();
            with_effects(
                state,
                vec![
                    Effect::PersistMessage { message: msg.clone() },
                    Effect::BroadcastToRoom { room_id, event: message_added_event(&msg) },
                ],
            )
        }

        RoomMessage::AgentJoined { agent_id, agent_name, at_ms, system_message_id } => {
            state.members.insert(agent_id.clone());
            if matches!(state.phase, crate::values::RoomPhase::Idle) {
                state.phase = crate::values::RoomPhase::Active;
            }
            let room_id = state.config.id.clone();
            let line = ChatMessage::system_line(
                system_message_id,
                room_id.clone(),
                format!("{agent_name} joined the room"),
                MessageType::Join,
                at_ms,
            );
            state.push_message(line.clone());

            with_effects(
                state,
                vec![
                    Effect::PersistMessage { message: line.clone() },
                    Effect::BroadcastToRoom {
                        room_id: room_id.clone(),
                        event: BroadcastEvent {
                            kind: "agent_joined".to_string(),
                            room_id: Some(room_id.clone()),
                            payload: serde_json::json!({"agentId": agent_id, "agentName": agent_name}),
                        },
                    },
                    Effect::BroadcastToRoom { room_id, event: message_added_event(&line) },
                ],
            )
        }

        RoomMessage::AgentLeft { agent_id, agent_name, at_ms, system_message_id } => {
            state.members.remove(&agent_id);
            state.pending_responders.remove(&agent_id);
            state.pending_since_ms.remove(&agent_id);
            let room_id = state.config.id.clone();
            let line = ChatMessage::system_line(
                system_message_id,
                room_id.clone(),
                format!("{agent_name} left the room"),
                MessageType::Leave,
                at_ms,
            );
            state.push_message(line.clone());

            with_effects(
                state,
                vec![
                    Effect::PersistMessage { message: line.clone() },
                    Effect::BroadcastToRoom {
                        room_id: room_id.clone(),
                        event: BroadcastEvent {
                            kind: "agent_left".to_string(),
                            room_id: Some(room_id.clone()),
                            payload: serde_json::json!({"agentId": agent_id, "agentName": agent_name}),
                        },
                    },
                    Effect::BroadcastToRoom { room_id, event: message_added_event(&line) },
                ],
            )
        }

        RoomMessage::AgentTyping { agent_id, typing } => {
            let room_id = state.config.id.clone();
            state_only_with_broadcast(
                state,
                room_id,
                BroadcastEvent {
                    kind: "agent_typing".to_string(),
                    room_id: None,
                    payload: serde_json::json!({"agentId": agent_id, "typing": typing}),
                },
            )
        }

        RoomMessage::ClearMessages => {
            state.messages.clear();
            let room_id = state.config.id.clone();
            with_effects(
                state,
                vec![
                    Effect::DeleteRoomMessages { room_id: room_id.clone() },
                    notification(room_id, "messages cleared", crate::error::Severity::Info),
                ],
            )
        }

        RoomMessage::ResetRoom => {
            state.messages.clear();
            state.pending_responders.clear();
            state.pending_since_ms.clear();
            state.phase = crate::values::RoomPhase::Active;
            let room_id = state.config.id.clone();
            with_effects(
                state,
                vec![
                    Effect::DeleteRoomMessages { room_id: room_id.clone() },
                    notification(room_id, "room reset", crate::error::Severity::Info),
                ],
            )
        }

        RoomMessage::MessagesLoaded { messages } => {
            state.messages = messages.into_iter().collect();
            while state.messages.len() > crate::values::room::ROOM_RING_CAPACITY {
                state.messages.pop_front();
            }
            state_only(state)
        }

        RoomMessage::RoomTick { now_ms } => {
            let timed_out: Vec<AgentId> = state
                .pending_since_ms
                .iter()
                .filter(|(_, since)| now_ms - **since > PENDING_RESPONDER_TIMEOUT_MS)
                .map(|(id, _)| id.clone())
                .collect();

            if timed_out.is_empty() {
                return no_change(state);
            }

            for agent_id in &timed_out {
                state.pending_responders.remove(agent_id);
                state.pending_since_ms.remove(agent_id);
            }
            if state.pending_responders.is_empty() {
                state.phase = crate::values::RoomPhase::Active;
            }

            let room_id = state.config.id.clone();
            let effects = timed_out
                .into_iter()
                .map(|agent_id| Effect::BroadcastToRoom {
                    room_id: room_id.clone(),
                    event: BroadcastEvent {
                        kind: "system_notification".to_string(),
                        room_id: Some(room_id.clone()),
                        payload: serde_json::json!({
                            "severity": crate::error::Severity::Warn,
                            "message": format!("agent {agent_id} timed out responding"),
                        }),
                    },
                })
                .collect();

            with_effects(state, effects)
        }
    }
}

fn state_only_with_broadcast(
    state: RoomState,
    room_id: crate::ids::RoomId,
    event: BroadcastEvent,
) -> (RoomState, Vec<Effect>) {
    with_effects(state, vec![Effect::BroadcastToRoom { room_id, event }])
}

fn notification(room_id: crate::ids::RoomId, message: &str, severity: crate::error::Severity) -> Effect {
    Effect::BroadcastToRoom {
        room_id: room_id.clone(),
        event: BroadcastEvent {
            kind: "system_notification".to_string(),
            room_id: Some(room_id),
            payload: serde_json::json!({"severity": severity, "message": message}),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MessageId, RoomId, SenderId};
    use crate::values::{RoomConfig, RoomPhase};

    fn room(id: &str) -> RoomState {
        let mut state = RoomState::new(RoomConfig {
            id: RoomId::new(id),
            name: "general".to_string(),
            description: String::new(),
            topic: None,
            created_at_ms: 0,
        });
        state.members.insert(AgentId::new("a"));
        state.members.insert(AgentId::new("b"));
        state
    }

    fn user_message(room_id: &str, content: &str, mentions: Vec<String>) -> ChatMessage {
        ChatMessage::new(
            MessageId::new("m1"),
            RoomId::new(room_id),
            SenderId::User(crate::ids::UserId::new("u1")),
            "user",
            content,
            MessageType::Chat,
            1_000,
            None,
            mentions,
            Vec::new(),
        )
    }

    #[test]
    fn mention_routes_only_to_mentioned_agent() {
        let state = room("r1");
        let msg = user_message("r1", "hi @b", vec!["b".to_string()]);
        let mut tendencies = BTreeMap::new();
        tendencies.insert(AgentId::new("a"), ("Ada".to_string(), 0.9));
        tendencies.insert(AgentId::new("b"), ("Bea".to_string(), 0.9));

        let (next, effects) = interpret(
            state,
            RoomMessage::UserMessage {
                message: msg,
                mentioned_agents: vec![AgentId::new("b")],
                member_tendencies: tendencies,
                tendency_threshold: 0.3,
                fanout_cap: 3,
                context_window: 20,
            },
        );

        assert_eq!(next.phase, RoomPhase::Processing);
        assert_eq!(next.pending_responders.len(), 1);
        assert!(next.pending_responders.contains(&AgentId::new("b")));

        let sends = effects
            .iter()
            .filter(|e| matches!(e, Effect::SendToActor { .. }))
            .count();
        assert_eq!(sends, 1);
    }

    #[test]
    fn agent_response_clears_pending_and_reactivates() {
        let mut state = room("r1");
        state.phase = RoomPhase::Processing;
        state.pending_responders.insert(AgentId::new("b"));
        state.pending_since_ms.insert(AgentId::new("b"), 0);

        let response = ChatMessage::new(
            MessageId::new("m2"),
            RoomId::new("r1"),
            SenderId::Agent(AgentId::new("b")),
            "b",
            "hey",
            MessageType::Chat,
            2_000,
            None,
            Vec::new(),
            Vec::new(),
        );

        let (next, _effects) =
            interpret(state, RoomMessage::AgentResponse { agent_id: AgentId::new("b"), message: response });

        assert!(next.pending_responders.is_empty());
        assert_eq!(next.phase, RoomPhase::Active);
    }

    #[test]
    fn room_tick_times_out_stale_responders() {
        let mut state = room("r1");
        state.phase = RoomPhase::Processing;
        state.pending_responders.insert(AgentId::new("b"));
        state.pending_since_ms.insert(AgentId::new("b"), 0);

        let (next, effects) = interpret(state, RoomMessage::RoomTick { now_ms: 40_000 });

        assert!(next.pending_responders.is_empty());
        assert_eq!(next.phase, RoomPhase::Active);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn ring_buffer_discards_oldest_at_capacity() {
        let mut state = room("r1");
        for i in 0..crate::values::room::ROOM_RING_CAPACITY + 5 {
            state.push_message(ChatMessage::new(
                MessageId::new(format!("m{i}")),
                RoomId::new("r1"),
                SenderId::System,
                "system",
                "x",
                MessageType::System,
                i as i64,
                None,
                Vec::new(),
                Vec::new(),
            ));
        }
        assert_eq!(state.messages.len(), crate::values::room::ROOM_RING_CAPACITY);
        assert_eq!(state.messages.front().unwrap().id, MessageId::new("m5"));
    }
}
