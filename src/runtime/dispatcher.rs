//! Effect dispatcher: after an interpreter returns, its
//! effects are batched and run in a fixed order — persistence, then
//! actor-sends, then the remaining actor-control effects, then LLM/tool
//! calls concurrently, then broadcasts. The ordering keeps a room's
//! `message_added` broadcast from racing ahead of the database write it
//! depends on, while LLM/tool calls (which are themselves fire-and-forget
//! from the dispatcher's point of view) never block broadcast delivery.

use crate::effect::{Effect, EffectCategory};
use crate::executor::{BroadcastExecutor, LlmExecutor, PersistenceExecutor, ToolExecutor};
use crate::ids::ActorAddress;
use crate::runtime::envelope::Envelope;
use crate::runtime::registry::{ActorState, Registry};
use crate::runtime::scheduler::Scheduler;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub struct Dispatcher {
    persistence: Arc<dyn PersistenceExecutor>,
    llm: Arc<dyn LlmExecutor>,
    tool: Arc<dyn ToolExecutor>,
    broadcast: Arc<dyn BroadcastExecutor>,
    registry: Arc<Mutex<Registry>>,
    scheduler: Arc<Mutex<Scheduler>>,
    ready_tx: mpsc::UnboundedSender<Envelope>,
    default_max_tool_calls: u32,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persistence: Arc<dyn PersistenceExecutor>,
        llm: Arc<dyn LlmExecutor>,
        tool: Arc<dyn ToolExecutor>,
        broadcast: Arc<dyn BroadcastExecutor>,
        registry: Arc<Mutex<Registry>>,
        scheduler: Arc<Mutex<Scheduler>>,
        ready_tx: mpsc::UnboundedSender<Envelope>,
        default_max_tool_calls: u32,
    ) -> Self {
        Self { persistence, llm, tool, broadcast, registry, scheduler, ready_tx, default_max_tool_calls }
    }

    pub async fn dispatch(&self, effects: Vec<Effect>, now_ms: i64) {
        let mut persistence_effects = Vec::new();
        let mut actor_sends = Vec::new();
        let mut control_effects = Vec::new();
        let mut concurrent_effects = Vec::new();
        let mut broadcast_effects = Vec::new();

        for effect in effects {
            match effect.category() {
                EffectCategory::Persistence => persistence_effects.push(effect),
                EffectCategory::ActorControl => match effect {
                    Effect::SendToActor { .. } => actor_sends.push(effect),
                    other => control_effects.push(other),
                },
                EffectCategory::Llm | EffectCategory::Tool => concurrent_effects.push(effect),
                EffectCategory::Broadcast => broadcast_effects.push(effect),
            }
        }

        for effect in persistence_effects {
            self.run_persistence(effect, now_ms).await;
        }

        for effect in actor_sends {
            self.enqueue_actor_send(effect, now_ms);
        }

        for effect in control_effects {
            self.run_actor_control(effect, now_ms).await;
        }

        join_all(concurrent_effects.into_iter().map(|effect| self.run_concurrent(effect))).await;

        for effect in broadcast_effects {
            self.run_broadcast(effect).await;
        }
    }

    async fn run_persistence(&self, effect: Effect, now_ms: i64) {
        let result = match effect {
            Effect::PersistMessage { message } => self.persistence.persist_message(message).await,
            Effect::DeleteRoomMessages { room_id } => self.persistence.delete_room_messages(room_id).await,
            Effect::UpsertRoomConfig { config } => self.persistence.upsert_room_config(config).await,
            Effect::UpsertTask { project_room_id, task } => {
                self.persistence.upsert_task(project_room_id, task).await
            }
            Effect::UpsertArtifact { room_id, agent_id, path, content } => {
                self.persistence.upsert_artifact(room_id, agent_id, path, content).await
            }
            Effect::DeleteArtifact { room_id, agent_id, path } => {
                self.persistence.delete_artifact(room_id, agent_id, path).await
            }
            Effect::LoadMessages { room_id, limit, reply_to, reply_tag } => {
                match self.persistence.load_messages(room_id, limit).await {
                    Ok(messages) => {
                        let _ = reply_tag;
                        self.ready_tx
                            .send(Envelope::new(
                                reply_to,
                                crate::effect::ActorMessageEnvelope::Room(
                                    crate::interpreter::room::RoomMessage::MessagesLoaded { messages },
                                ),
                                None,
                                now_ms,
                            ))
                            .ok();
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            other => {
                log::error!("non-persistence effect routed to persistence batch: {other:?}");
                Ok(())
            }
        };
        if let Err(e) = result {
            log::error!("persistence effect failed: {e}");
        }
    }

    fn enqueue_actor_send(&self, effect: Effect, now_ms: i64) {
        if let Effect::SendToActor { to, message } = effect {
            self.ready_tx.send(Envelope::new(to, message, None, now_ms)).ok();
        }
    }

    async fn run_actor_control(&self, effect: Effect, now_ms: i64) {
        match effect {
            Effect::ScheduleMessage { id, to, message, delay_ms, recurring } => {
                self.scheduler.lock().await.schedule(id, to, message, now_ms, delay_ms, recurring);
            }
            Effect::CancelScheduled { id } => {
                self.scheduler.lock().await.cancel(&id);
            }
            Effect::SpawnRoomActor { config } => {
                let address = ActorAddress::room(&config.id);
                self.registry
                    .lock()
                    .await
                    .insert(address, ActorState::Room(crate::values::RoomState::new(config)));
            }
            Effect::SpawnAgentActor { config } => {
                let address = ActorAddress::agent(&config.id);
                self.registry
                    .lock()
                    .await
                    .insert(address, ActorState::Agent(crate::values::AgentState::new(config, self.default_max_tool_calls)));
            }
            Effect::SpawnProjectActor { project } => {
                let address = ActorAddress::project(&project.id);
                self.registry.lock().await.insert(address, ActorState::Project(project));
            }
            Effect::StopActor { address } => {
                self.registry.lock().await.remove(&address);
            }
            other => log::error!("non-control effect routed to actor-control batch: {other:?}"),
        }
    }

    async fn run_concurrent(&self, effect: Effect) {
        match effect {
            Effect::CallAnthropic { agent_id, request, reply_tag } => {
                self.llm.call(agent_id, request, reply_tag).await;
            }
            Effect::CancelApiCall { reply_tag } => {
                self.llm.cancel(reply_tag).await;
            }
            Effect::ExecuteToolsBatch { agent_id, room_id, calls, reply_tag } => {
                self.tool.execute_batch(agent_id, room_id, calls, reply_tag).await;
            }
            Effect::CancelToolExecution { reply_tag } => {
                self.tool.cancel(reply_tag).await;
            }
            other => log::error!("non-llm/tool effect routed to concurrent batch: {other:?}"),
        }
    }

    async fn run_broadcast(&self, effect: Effect) {
        match effect {
            Effect::BroadcastToRoom { room_id, event } => self.broadcast.broadcast_to_room(room_id, event).await,
            Effect::BroadcastToAll { event } => self.broadcast.broadcast_to_all(event).await,
            Effect::SendToClient { client_id, event } => self.broadcast.send_to_client(client_id, event).await,
            other => log::error!("non-broadcast effect routed to broadcast batch: {other:?}"),
        }
    }
}
