//! Out-of-core surfaces: HTTP/WebSocket transport, CLI, and persona file
//! format are explicitly out of scope for this crate.
//!
//! These traits exist only so a binary wiring this runtime together has a
//! named seam to implement against, without this crate prescribing a web
//! framework, wire format, or persona file layout.

use crate::ids::ClientId;
use async_trait::async_trait;

/// The boundary between an inbound connection (however it is terminated —
/// WebSocket, unix socket, in-process channel) and [`crate::runtime::Runtime`].
/// A caller implements this against whatever transport it chooses; this
/// crate never opens a listening socket itself.
#[async_trait]
pub trait HttpSurface: Send + Sync {
    /// Registers a newly connected client and returns the id the runtime's
    /// broadcast executor should address it by.
    async fn accept(&self) -> ClientId;
    async fn disconnect(&self, client_id: ClientId);
}

/// Loads [`crate::values::AgentConfig`] personas from whatever storage format
/// a deployment chooses (YAML file, database row, remote config service).
/// This crate only consumes the resulting `AgentConfig`; it does not read or
/// parse persona files itself.
pub trait PersonaLoader: Send + Sync {
    fn load_all(&self) -> Result<Vec<crate::values::AgentConfig>, crate::error::RuntimeError>;
}
