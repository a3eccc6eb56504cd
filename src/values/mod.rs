//! Immutable domain values — messages, agent/room/project/director state,
//! identifiers. No I/O, no interpretation logic; see [`crate::interpreter`]
//! for the pure state-transition functions that operate on these types.

pub mod agent;
pub mod director;
pub mod message;
pub mod project;
pub mod room;

pub use agent::{AgentConfig, AgentState, AgentStatus, ConversationTurn, TokenUsage, TurnRole};
pub use director::DirectorState;
pub use message::{Attachment, ChatMessage, MessageType};
pub use project::{ProjectPhase, ProjectState, Task, TaskStatus};
pub use room::{RoomConfig, RoomPhase, RoomState};
