//! Pure state-transition functions, one per actor kind.
//!
//! Every interpreter is `Fn(State, Message) -> (State, Vec<Effect>)`: no I/O,
//! no clocks, no randomness. Time and identifiers a transition needs arrive
//! already stamped on the message by the runtime (see [`crate::runtime`]).

pub mod agent;
pub mod director;
pub mod project;
pub mod room;

use crate::effect::Effect;

/// No effects, state unchanged. Used for rejected/ignored messages (stale
/// reply tags, busy actors).
pub fn no_change<S>(state: S) -> (S, Vec<Effect>) {
    (state, Vec::new())
}

/// No effects, but the state moved. Used for internal bookkeeping
/// transitions that nothing outside the actor needs to observe.
pub fn state_only<S>(next: S) -> (S, Vec<Effect>) {
    (next, Vec::new())
}

/// State moved and effects emitted — the common case.
pub fn with_effects<S>(next: S, effects: Vec<Effect>) -> (S, Vec<Effect>) {
    (next, effects)
}

/// The generic shape the runtime drives each actor kind through — a single
/// `Handle(state, msg) -> (state, effects)` method. The four actor kinds
/// each implement this over their own state/message types; the runtime picks
/// the right one by the envelope's `ActorKind`.
pub trait Interpreter {
    type State;
    type Message;

    fn interpret(state: Self::State, message: Self::Message) -> (Self::State, Vec<Effect>);
}

pub struct RoomInterpreter;
impl Interpreter for RoomInterpreter {
    type State = crate::values::RoomState;
    type Message = room::RoomMessage;

    fn interpret(state: Self::State, message: Self::Message) -> (Self::State, Vec<Effect>) {
        room::interpret(state, message)
    }
}

pub struct AgentInterpreter;
impl Interpreter for AgentInterpreter {
    type State = crate::values::AgentState;
    type Message = agent::AgentMessage;

    fn interpret(state: Self::State, message: Self::Message) -> (Self::State, Vec<Effect>) {
        agent::interpret(state, message)
    }
}

pub struct ProjectInterpreter;
impl Interpreter for ProjectInterpreter {
    type State = crate::values::ProjectState;
    type Message = project::ProjectMessage;

    fn interpret(state: Self::State, message: Self::Message) -> (Self::State, Vec<Effect>) {
        project::interpret(state, message)
    }
}

pub struct DirectorInterpreter;
impl Interpreter for DirectorInterpreter {
    type State = crate::values::DirectorState;
    type Message = director::DirectorMessage;

    fn interpret(state: Self::State, message: Self::Message) -> (Self::State, Vec<Effect>) {
        director::interpret(state, message)
    }
}
