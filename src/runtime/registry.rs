//! The actor registry: `ActorAddress -> ActorInstance`.
//!
//! Each instance owns its state opaquely to the runtime; only the matching
//! interpreter knows how to read it. The registry itself only tracks which
//! address holds which variant and whether it is currently being processed.

use crate::effect::{ActorMessageEnvelope, Effect};
use crate::ids::{ActorAddress, ActorKind};
use crate::interpreter::{agent, director, project, room, Interpreter};
use crate::values::{AgentState, DirectorState, ProjectState, RoomState};
use std::collections::HashMap;

/// The per-actor-kind state an instance carries, erased behind one enum so
/// the registry can store every kind in a single map.
#[derive(Debug, Clone)]
pub enum ActorState {
    Room(RoomState),
    Agent(AgentState),
    Project(ProjectState),
    Director(DirectorState),
}

impl ActorState {
    pub fn kind(&self) -> ActorKind {
        match self {
            ActorState::Room(_) => ActorKind::Room,
            ActorState::Agent(_) => ActorKind::Agent,
            ActorState::Project(_) => ActorKind::Project,
            ActorState::Director(_) => ActorKind::Director,
        }
    }
}

pub struct ActorInstance {
    pub state: ActorState,
    /// Set while a worker is inside the interpreter call for this actor;
    /// any envelope pulled for a busy actor is re-queued at the ready
    /// queue's tail.
    pub processing: bool,
}

impl ActorInstance {
    pub fn new(state: ActorState) -> Self {
        Self { state, processing: false }
    }
}

/// Applies one message to the addressed actor's interpreter, erasing the
/// concrete state/message types behind [`ActorState`]/[`ActorMessageEnvelope`].
///
/// A message addressed to the wrong actor kind (e.g. a `RoomMessage` routed
/// to an `ActorKind::Agent`) is a producer bug: it is logged and
/// the state is returned unchanged with no effects.
pub fn apply(state: ActorState, message: ActorMessageEnvelope) -> (ActorState, Vec<Effect>) {
    match (state, message) {
        (ActorState::Room(s), ActorMessageEnvelope::Room(m)) => {
            let (next, effects) = room::RoomInterpreter::interpret(s, m);
            (ActorState::Room(next), effects)
        }
        (ActorState::Agent(s), ActorMessageEnvelope::Agent(m)) => {
            let (next, effects) = agent::AgentInterpreter::interpret(s, m);
            (ActorState::Agent(next), effects)
        }
        (ActorState::Project(s), ActorMessageEnvelope::Project(m)) => {
            let (next, effects) = project::ProjectInterpreter::interpret(s, m);
            (ActorState::Project(next), effects)
        }
        (ActorState::Director(s), ActorMessageEnvelope::Director(m)) => {
            let (next, effects) = director::DirectorInterpreter::interpret(s, m);
            (ActorState::Director(next), effects)
        }
        (state, message) => {
            log::error!(
                "dropping message of wrong kind for actor {:?}: {:?}",
                state.kind(),
                message
            );
            (state, Vec::new())
        }
    }
}

/// `ActorAddress -> ActorInstance`, guarded by the caller (the runtime holds
/// this behind a single mutex — each actor's state is a single mutable
/// structure guarded by its own lock).
#[derive(Default)]
pub struct Registry {
    instances: HashMap<ActorAddress, ActorInstance>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: ActorAddress, state: ActorState) {
        self.instances.insert(address, ActorInstance::new(state));
    }

    pub fn remove(&mut self, address: &ActorAddress) -> Option<ActorInstance> {
        self.instances.remove(address)
    }

    pub fn contains(&self, address: &ActorAddress) -> bool {
        self.instances.contains_key(address)
    }

    pub fn get_mut(&mut self, address: &ActorAddress) -> Option<&mut ActorInstance> {
        self.instances.get_mut(address)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
