//! The actor runtime: registry, ready queue, scheduler, and dispatcher
//! wired into one [`Runtime`].

pub mod dispatcher;
pub mod envelope;
pub mod registry;
pub mod scheduler;
#[allow(clippy::module_inception)]
pub mod runtime;

pub use registry::ActorState;
pub use runtime::Runtime;

use crate::effect::ActorMessageEnvelope;
use crate::ids::ActorAddress;
use async_trait::async_trait;

/// The narrow surface executors need to re-enter the system: cyclic
/// references between actors are resolved by message passing, not shared
/// pointers. Executors hold `Arc<dyn RuntimeHandle>`, never the concrete
/// [`Runtime`],
/// so `executor::*` never depends on `runtime::Runtime` directly.
#[async_trait]
pub trait RuntimeHandle: Send + Sync {
    async fn send(&self, to: ActorAddress, message: ActorMessageEnvelope, from: Option<ActorAddress>);
}
