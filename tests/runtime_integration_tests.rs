//! End-to-end tests that spin up a real `Runtime` and drive it through the
//! ready queue, rather than calling interpreter functions directly. These
//! exercise the wiring between the registry, dispatcher, scheduler, and
//! executors that the per-module unit tests can't see.
//!
//! Anthropic is never actually called: `FakeLlmExecutor` scripts responses
//! in the same `SequencedMockClient`-style the rest of this pack's agent
//! tests use, re-entering the runtime through `RuntimeHandle::send` exactly
//! like the production executor does.

use agent_room::effect::{ActorMessageEnvelope, LlmRequest};
use agent_room::executor::persistence::SqlitePersistence;
use agent_room::executor::broadcast::ClientRegistryBroadcastExecutor;
use agent_room::executor::tool::{SandboxedToolExecutor, WorkspaceLayout};
use agent_room::executor::{BroadcastExecutor, LlmExecutor, PersistenceExecutor, ToolExecutor};
use agent_room::ids::{ActorAddress, AgentId, ClientId, MessageId, ReplyTag, RoomId, SenderId, UserId};
use agent_room::interpreter::agent::{AgentMessage, ContentBlock, StopReason};
use agent_room::interpreter::director::DirectorMessage;
use agent_room::interpreter::room::RoomMessage;
use agent_room::values::agent::TokenUsage;
use agent_room::values::message::{ChatMessage, MessageType};
use agent_room::values::{AgentConfig, RoomConfig};
use agent_room::{Runtime, RuntimeHandle};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Forwards to whatever `Runtime` is installed after the fact, so executors
/// can be constructed before `Runtime::start` exists to hand them a handle.
/// A caller wiring this crate into a binary needs the same indirection;
/// tests recreate it locally rather than pulling in a real transport.
#[derive(Default)]
struct DeferredHandle(OnceCell<Arc<Runtime>>);

impl DeferredHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self(OnceCell::new()))
    }

    fn install(&self, runtime: Arc<Runtime>) {
        if self.0.set(runtime).is_err() {
            panic!("runtime installed twice");
        }
    }
}

#[async_trait]
impl RuntimeHandle for DeferredHandle {
    async fn send(&self, to: ActorAddress, message: ActorMessageEnvelope, from: Option<ActorAddress>) {
        if let Some(runtime) = self.0.get() {
            runtime.send(to, message, from).await;
        }
    }
}

#[derive(Clone)]
enum ScriptedReply {
    Text(String),
    ToolUse { call_id: String, name: String, input: serde_json::Value },
    TransientError,
}

/// Scripted stand-in for `AnthropicLlmExecutor`: pops the next reply off a
/// queue and delivers it back through the handle after an optional delay,
/// exactly the shape the real executor uses to re-enter the system.
struct FakeLlmExecutor {
    handle: Arc<dyn RuntimeHandle>,
    scripts: Mutex<VecDeque<ScriptedReply>>,
    reply_delay_ms: u64,
    calls: Mutex<Vec<ReplyTag>>,
    cancelled: Mutex<HashSet<String>>,
}

impl FakeLlmExecutor {
    fn new(handle: Arc<dyn RuntimeHandle>, scripts: Vec<ScriptedReply>, reply_delay_ms: u64) -> Self {
        Self {
            handle,
            scripts: Mutex::new(scripts.into()),
            reply_delay_ms,
            calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(HashSet::new()),
        }
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn was_cancelled(&self, reply_tag: &ReplyTag) -> bool {
        self.cancelled.lock().await.contains(&reply_tag.0)
    }
}

#[async_trait]
impl LlmExecutor for FakeLlmExecutor {
    async fn call(&self, agent_id: AgentId, _request: LlmRequest, reply_tag: ReplyTag) {
        self.calls.lock().await.push(reply_tag.clone());
        let scripted = self.scripts.lock().await.pop_front();
        let handle = self.handle.clone();
        let delay_ms = self.reply_delay_ms;

        tokio::spawn(async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let message = match scripted {
                Some(ScriptedReply::Text(text)) => AgentMessage::ApiResponse {
                    content: vec![ContentBlock::Text { text }],
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                    reply_tag,
                    response_message_id: MessageId::new("resp-msg"),
                    now_ms: 10_000,
                },
                Some(ScriptedReply::ToolUse { call_id, name, input }) => AgentMessage::ApiResponse {
                    content: vec![ContentBlock::ToolUse { id: call_id, name, input }],
                    stop_reason: StopReason::ToolUse,
                    usage: TokenUsage::default(),
                    reply_tag,
                    response_message_id: MessageId::new("resp-msg-tool"),
                    now_ms: 10_000,
                },
                Some(ScriptedReply::TransientError) => {
                    AgentMessage::ApiError { message: "rate limited".to_string(), transient: true, reply_tag }
                }
                None => AgentMessage::ApiResponse {
                    content: vec![ContentBlock::Text { text: "default reply".to_string() }],
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                    reply_tag,
                    response_message_id: MessageId::new("resp-msg-default"),
                    now_ms: 10_000,
                },
            };
            handle.send(ActorAddress::agent(&agent_id), ActorMessageEnvelope::Agent(message), None).await;
        });
    }

    async fn cancel(&self, reply_tag: ReplyTag) {
        self.cancelled.lock().await.insert(reply_tag.0);
    }
}

fn user_message(room_id: &str, id: &str, content: &str, mentions: Vec<String>) -> ChatMessage {
    ChatMessage::new(
        MessageId::new(id),
        RoomId::new(room_id),
        SenderId::User(UserId::new("u1")),
        "user",
        content,
        MessageType::Chat,
        1_000,
        None,
        mentions,
        Vec::new(),
    )
}

fn room_config(id: &str) -> RoomConfig {
    RoomConfig { id: RoomId::new(id), name: "general".to_string(), description: String::new(), topic: None, created_at_ms: 0 }
}

/// Creates director + room r1 + agent `agent_id`, and waits for all three to
/// land in the registry before returning.
async fn setup_room_with_agent(runtime: &Arc<Runtime>, agent_id: &str) {
    runtime.spawn_director().await;
    runtime
        .send(
            ActorAddress::director(),
            ActorMessageEnvelope::Director(DirectorMessage::CreateRoom { config: room_config("r1") }),
            None,
        )
        .await;
    runtime
        .send(
            ActorAddress::director(),
            ActorMessageEnvelope::Director(DirectorMessage::RegisterAgent {
                config: AgentConfig::new(AgentId::new(agent_id), "Ada"),
            }),
            None,
        )
        .await;

    for _ in 0..100 {
        if runtime.actor_count().await >= 3 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room and agent never appeared in the registry");
}

fn tool_executor(persistence: Arc<dyn PersistenceExecutor>, handle: Arc<dyn RuntimeHandle>) -> Arc<dyn ToolExecutor> {
    let workspace = tempfile::tempdir().unwrap();
    let shared = tempfile::tempdir().unwrap();
    // Leaking the tempdirs keeps their backing directories alive for the
    // lifetime of the test process; they're cleaned up when the OS reaps it.
    let layout = WorkspaceLayout::new(workspace.keep(), shared.keep());
    Arc::new(SandboxedToolExecutor::new(layout, persistence, handle))
}

#[tokio::test]
async fn full_turn_round_trip_via_mention() {
    let persistence: Arc<dyn PersistenceExecutor> = Arc::new(SqlitePersistence::open_in_memory().unwrap());
    let broadcast = Arc::new(ClientRegistryBroadcastExecutor::new());
    let deferred = DeferredHandle::new();
    let llm = Arc::new(FakeLlmExecutor::new(deferred.clone(), vec![ScriptedReply::Text("hello there".to_string())], 0));
    let tool = tool_executor(persistence.clone(), deferred.clone());

    let runtime = Runtime::start(persistence.clone(), llm.clone(), tool, broadcast.clone(), Duration::from_millis(20), 50);
    deferred.install(runtime.clone());

    setup_room_with_agent(&runtime, "ada").await;

    let mut events = broadcast.register(ClientId::new("c1"), Some(RoomId::new("r1")));

    let mut tendencies = BTreeMap::new();
    tendencies.insert(AgentId::new("ada"), ("Ada".to_string(), 0.9));
    runtime
        .send(
            ActorAddress::room(&RoomId::new("r1")),
            ActorMessageEnvelope::Room(RoomMessage::UserMessage {
                message: user_message("r1", "m1", "hi @ada", vec!["ada".to_string()]),
                mentioned_agents: vec![AgentId::new("ada")],
                member_tendencies: tendencies,
                tendency_threshold: 0.3,
                fanout_cap: 3,
                context_window: 20,
            }),
            None,
        )
        .await;

    let first = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    assert_eq!(first.kind, "message_added");
    assert_eq!(first.payload["content"], "hi @ada");

    let second = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    assert_eq!(second.kind, "message_added");
    assert_eq!(second.payload["content"], "hello there");
    assert_eq!(second.payload["sender_name"], "Ada");

    let persisted = persistence.load_messages(RoomId::new("r1"), 10).await.unwrap();
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn tool_use_round_precedes_final_response() {
    let persistence: Arc<dyn PersistenceExecutor> = Arc::new(SqlitePersistence::open_in_memory().unwrap());
    let broadcast = Arc::new(ClientRegistryBroadcastExecutor::new());
    let deferred = DeferredHandle::new();
    let llm = Arc::new(FakeLlmExecutor::new(
        deferred.clone(),
        vec![
            ScriptedReply::ToolUse {
                call_id: "c1".to_string(),
                name: "bash".to_string(),
                input: serde_json::json!({"command": "echo hi"}),
            },
            ScriptedReply::Text("done".to_string()),
        ],
        0,
    ));
    let tool = tool_executor(persistence.clone(), deferred.clone());

    let runtime = Runtime::start(persistence.clone(), llm.clone(), tool, broadcast.clone(), Duration::from_millis(20), 50);
    deferred.install(runtime.clone());

    setup_room_with_agent(&runtime, "ada").await;
    let mut events = broadcast.register(ClientId::new("c1"), Some(RoomId::new("r1")));

    let mut tendencies = BTreeMap::new();
    tendencies.insert(AgentId::new("ada"), ("Ada".to_string(), 0.9));
    runtime
        .send(
            ActorAddress::room(&RoomId::new("r1")),
            ActorMessageEnvelope::Room(RoomMessage::UserMessage {
                message: user_message("r1", "m1", "run something @ada", vec!["ada".to_string()]),
                mentioned_agents: vec![AgentId::new("ada")],
                member_tendencies: tendencies,
                tendency_threshold: 0.3,
                fanout_cap: 3,
                context_window: 20,
            }),
            None,
        )
        .await;

    // user message broadcast
    let _ = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    // final agent reply, after the tool round, is the next message_added
    let reply = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    assert_eq!(reply.kind, "message_added");
    assert_eq!(reply.payload["content"], "done");

    assert_eq!(llm.call_count().await, 2);
}

#[tokio::test]
async fn superseding_respond_cancels_in_flight_call() {
    let persistence: Arc<dyn PersistenceExecutor> = Arc::new(SqlitePersistence::open_in_memory().unwrap());
    let broadcast = Arc::new(ClientRegistryBroadcastExecutor::new());
    let deferred = DeferredHandle::new();
    // 500ms reply delay gives the second RespondToMessage time to arrive and
    // cancel the first call before it would have completed.
    let llm = Arc::new(FakeLlmExecutor::new(
        deferred.clone(),
        vec![ScriptedReply::Text("first".to_string()), ScriptedReply::Text("second".to_string())],
        500,
    ));
    let tool = tool_executor(persistence.clone(), deferred.clone());

    let runtime = Runtime::start(persistence.clone(), llm.clone(), tool, broadcast.clone(), Duration::from_millis(20), 50);
    deferred.install(runtime.clone());

    setup_room_with_agent(&runtime, "ada").await;
    let mut events = broadcast.register(ClientId::new("c1"), Some(RoomId::new("r1")));

    let mut tendencies = BTreeMap::new();
    tendencies.insert(AgentId::new("ada"), ("Ada".to_string(), 0.9));

    for (msg_id, content) in [("m1", "first @ada"), ("m2", "second @ada")] {
        runtime
            .send(
                ActorAddress::room(&RoomId::new("r1")),
                ActorMessageEnvelope::Room(RoomMessage::UserMessage {
                    message: user_message("r1", msg_id, content, vec!["ada".to_string()]),
                    mentioned_agents: vec![AgentId::new("ada")],
                    member_tendencies: tendencies.clone(),
                    tendency_threshold: 0.3,
                    fanout_cap: 3,
                    context_window: 20,
                }),
                None,
            )
            .await;
    }

    // both user messages land as message_added broadcasts first
    let _ = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();

    // eventually exactly one agent reply shows up (the one tied to the
    // second, superseding trigger) since the first call was cancelled.
    let reply = tokio::time::timeout(Duration::from_secs(3), events.recv()).await.unwrap().unwrap();
    assert_eq!(reply.kind, "message_added");
    assert_eq!(reply.payload["content"], "second");

    let first_tag = ReplyTag("resp:m1".to_string());
    for _ in 0..50 {
        if llm.was_cancelled(&first_tag).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(llm.was_cancelled(&first_tag).await, "first in-flight call was never cancelled");
}

#[tokio::test]
async fn transient_api_error_retries_then_succeeds() {
    let persistence: Arc<dyn PersistenceExecutor> = Arc::new(SqlitePersistence::open_in_memory().unwrap());
    let broadcast = Arc::new(ClientRegistryBroadcastExecutor::new());
    let deferred = DeferredHandle::new();
    let llm = Arc::new(FakeLlmExecutor::new(
        deferred.clone(),
        vec![ScriptedReply::TransientError, ScriptedReply::Text("recovered".to_string())],
        0,
    ));
    let tool = tool_executor(persistence.clone(), deferred.clone());

    // Fast scheduler tick so the ~1s retry backoff is observed promptly.
    let runtime = Runtime::start(persistence.clone(), llm.clone(), tool, broadcast.clone(), Duration::from_millis(20), 50);
    deferred.install(runtime.clone());

    setup_room_with_agent(&runtime, "ada").await;
    let mut events = broadcast.register(ClientId::new("c1"), Some(RoomId::new("r1")));

    let mut tendencies = BTreeMap::new();
    tendencies.insert(AgentId::new("ada"), ("Ada".to_string(), 0.9));
    runtime
        .send(
            ActorAddress::room(&RoomId::new("r1")),
            ActorMessageEnvelope::Room(RoomMessage::UserMessage {
                message: user_message("r1", "m1", "hi @ada", vec!["ada".to_string()]),
                mentioned_agents: vec![AgentId::new("ada")],
                member_tendencies: tendencies,
                tendency_threshold: 0.3,
                fanout_cap: 3,
                context_window: 20,
            }),
            None,
        )
        .await;

    let _ = tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    assert_eq!(reply.kind, "message_added");
    assert_eq!(reply.payload["content"], "recovered");
    assert_eq!(llm.call_count().await, 2);
}
