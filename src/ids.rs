//! Opaque, URL-safe identifiers and actor addresses.
//!
//! All ids are newtypes over `String` so the compiler catches a `RoomId`
//! passed where an `AgentId` is expected. Values never embed meaning beyond
//! uniqueness — callers mint them with [`new_id`] (or supply their own, e.g.
//! when restoring from storage).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(RoomId);
id_type!(AgentId);
id_type!(MessageId);
id_type!(ProjectId);
id_type!(TaskId);
id_type!(UserId);
id_type!(ClientId);

/// Generate a random, URL-safe identifier of the given kind, in the style of
/// a traditional admin-key generator (hex-encoded UUID,
/// no padding or separators beyond a readability prefix).
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{:032x}", uuid::Uuid::new_v4().as_u128())
}

/// The sender of a [`crate::values::message::ChatMessage`]: either a
/// registered agent, a human user, or the system itself (used for
/// join/leave/system-notification lines).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SenderId {
    Agent(AgentId),
    User(UserId),
    System,
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderId::Agent(id) => write!(f, "agent:{id}"),
            SenderId::User(id) => write!(f, "user:{id}"),
            SenderId::System => write!(f, "system"),
        }
    }
}

/// The kind half of an [`ActorAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Room,
    Agent,
    Project,
    Director,
}

/// `(kind, id)` — the runtime's routing key. There is exactly one director
/// instance, conventionally addressed `director:main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorAddress {
    pub kind: ActorKind,
    pub id: String,
}

impl ActorAddress {
    pub fn room(id: &RoomId) -> Self {
        Self { kind: ActorKind::Room, id: id.0.clone() }
    }

    pub fn agent(id: &AgentId) -> Self {
        Self { kind: ActorKind::Agent, id: id.0.clone() }
    }

    pub fn project(id: &ProjectId) -> Self {
        Self { kind: ActorKind::Project, id: id.0.clone() }
    }

    pub fn director() -> Self {
        Self { kind: ActorKind::Director, id: "main".to_string() }
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ActorKind::Room => "room",
            ActorKind::Agent => "agent",
            ActorKind::Project => "project",
            ActorKind::Director => "director",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// Correlation token used to route executor replies back to the originating
/// actor and to distinguish live calls from stale/cancelled ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyTag(pub String);

impl ReplyTag {
    pub fn new() -> Self {
        Self(new_id("tag"))
    }
}

impl Default for ReplyTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReplyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
