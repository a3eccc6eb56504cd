//! Concurrent runtime for multi-agent chat rooms.
//!
//! An effect-oriented interpreter layer (pure `(State, Message) -> (State,
//! Vec<Effect>)` functions, one per actor kind — room, agent, project,
//! director) sits behind an actor runtime that gives every actor a
//! single-writer mailbox and hands the effects it produces to executors:
//! persistence, LLM calls, tool execution, and room broadcast. See
//! [`interpreter`] for the pure core and [`runtime`]/[`executor`] for the
//! boundary that actually performs I/O.

pub mod adapters;
pub mod config;
pub mod effect;
pub mod error;
pub mod executor;
pub mod ids;
pub mod interpreter;
pub mod runtime;
pub mod tool_protocol;
pub mod tools;
pub mod values;

pub use config::Config;
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeHandle};
