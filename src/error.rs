//! Crate-wide error kinds.
//!
//! Interpreters never return `Result` — a failed transition is represented
//! as data. This type is for the boundary layer: executors,
//! the dispatcher, and process startup.

use std::error::Error;
use std::fmt;

/// One of the five error kinds the runtime distinguishes.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Network to the LLM, DB busy — retried by the executor with backoff;
    /// the actor only ever sees the final outcome.
    TransientIo(String),
    /// The interpreter rejected a message for the actor's current state.
    InvalidTransition(String),
    /// Tool-call counter or project turn budget exceeded.
    BudgetExceeded(String),
    /// LLM refused (non-2xx, non-transient) or a tool denied on a safety rule.
    ExternalRejection(String),
    /// Corrupt persisted state or missing required configuration; the
    /// runtime refuses to start.
    Fatal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TransientIo(msg) => write!(f, "transient I/O error: {msg}"),
            RuntimeError::InvalidTransition(msg) => write!(f, "invalid state transition: {msg}"),
            RuntimeError::BudgetExceeded(msg) => write!(f, "budget exceeded: {msg}"),
            RuntimeError::ExternalRejection(msg) => write!(f, "external rejection: {msg}"),
            RuntimeError::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

impl Error for RuntimeError {}

/// Severity attached to a `system_notification` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}
