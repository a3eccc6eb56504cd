//! The runtime proper: wires the [`Registry`], ready queue, [`Scheduler`],
//! and [`Dispatcher`] into one running system.
//!
//! Each actor is single-writer: the registry's mutex only ever changes the
//! `processing` flag and the stored state while the flag transitions, so two
//! workers can never interpret the same actor concurrently, while distinct
//! actors make progress in parallel — each actor processes one message at a
//! time, but distinct actors run concurrently.

use super::dispatcher::Dispatcher;
use super::envelope::Envelope;
use super::registry::Registry;
use super::scheduler::Scheduler;
use super::RuntimeHandle;
use crate::effect::ActorMessageEnvelope;
use crate::executor::{BroadcastExecutor, LlmExecutor, PersistenceExecutor, ToolExecutor};
use crate::ids::ActorAddress;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

const WORKER_COUNT: usize = 4;

pub struct Runtime {
    registry: Arc<Mutex<Registry>>,
    ready_tx: mpsc::UnboundedSender<Envelope>,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        persistence: Arc<dyn PersistenceExecutor>,
        llm: Arc<dyn LlmExecutor>,
        tool: Arc<dyn ToolExecutor>,
        broadcast: Arc<dyn BroadcastExecutor>,
        scheduler_tick: Duration,
        default_max_tool_calls: u32,
    ) -> Arc<Self> {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();

        let dispatcher = Arc::new(Dispatcher::new(
            persistence,
            llm,
            tool,
            broadcast,
            registry.clone(),
            scheduler.clone(),
            ready_tx.clone(),
            default_max_tool_calls,
        ));

        let runtime = Arc::new(Self { registry: registry.clone(), ready_tx: ready_tx.clone() });

        let ready_rx = Arc::new(Mutex::new(ready_rx));
        for _ in 0..WORKER_COUNT {
            let registry = registry.clone();
            let dispatcher = dispatcher.clone();
            let ready_rx = ready_rx.clone();
            let ready_tx = ready_tx.clone();
            tokio::spawn(async move {
                worker_loop(registry, dispatcher, ready_rx, ready_tx).await;
            });
        }

        {
            let scheduler = scheduler.clone();
            let ready_tx = ready_tx.clone();
            tokio::spawn(async move {
                scheduler_loop(scheduler, ready_tx, scheduler_tick).await;
            });
        }

        runtime
    }

    pub async fn spawn_director(&self) {
        let address = ActorAddress::director();
        let mut registry = self.registry.lock().await;
        if !registry.contains(&address) {
            registry.insert(address, super::registry::ActorState::Director(crate::values::DirectorState::new()));
        }
    }

    pub async fn actor_count(&self) -> usize {
        self.registry.lock().await.len()
    }
}

#[async_trait]
impl RuntimeHandle for Runtime {
    async fn send(&self, to: ActorAddress, message: ActorMessageEnvelope, from: Option<ActorAddress>) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.ready_tx.send(Envelope::new(to, message, from, now_ms)).ok();
    }
}

async fn worker_loop(
    registry: Arc<Mutex<Registry>>,
    dispatcher: Arc<Dispatcher>,
    ready_rx: Arc<Mutex<mpsc::UnboundedReceiver<Envelope>>>,
    ready_tx: mpsc::UnboundedSender<Envelope>,
) {
    loop {
        let envelope = {
            let mut rx = ready_rx.lock().await;
            rx.recv().await
        };
        let Some(envelope) = envelope else { break };

        let state = {
            let mut registry = registry.lock().await;
            let Some(instance) = registry.get_mut(&envelope.to) else {
                log::warn!("dropping message for unknown actor {}", envelope.to);
                continue;
            };
            if instance.processing {
                ready_tx.send(envelope).ok();
                continue;
            }
            instance.processing = true;
            instance.state.clone()
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let (next_state, effects) = super::registry::apply(state, envelope.message);

        {
            let mut registry = registry.lock().await;
            if let Some(instance) = registry.get_mut(&envelope.to) {
                instance.state = next_state;
                instance.processing = false;
            }
        }

        dispatcher.dispatch(effects, now_ms).await;
    }
}

async fn scheduler_loop(scheduler: Arc<Mutex<Scheduler>>, ready_tx: mpsc::UnboundedSender<Envelope>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let now_ms = chrono::Utc::now().timestamp_millis();
        let due = scheduler.lock().await.drain_due(now_ms);
        for entry in due {
            ready_tx.send(Envelope::new(entry.to, entry.message, None, now_ms)).ok();
        }
    }
}
