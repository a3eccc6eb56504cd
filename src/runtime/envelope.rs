//! Ready-queue envelopes.
//!
//! An envelope wraps a message with its destination, optional sender, and a
//! monotonically assigned sequence number. The sequence is assigned once at
//! the envelope's original enqueue and never reassigned on re-queue, so
//! replaying envelopes for one actor in sequence order always reproduces
//! arrival order even across busy-requeues.

use crate::effect::ActorMessageEnvelope;
use crate::ids::ActorAddress;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Hands out the next process-wide envelope sequence number.
pub fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: ActorAddress,
    pub message: ActorMessageEnvelope,
    pub from: Option<ActorAddress>,
    pub sequence: u64,
    pub enqueued_at_ms: i64,
}

impl Envelope {
    pub fn new(to: ActorAddress, message: ActorMessageEnvelope, from: Option<ActorAddress>, now_ms: i64) -> Self {
        Self { to, message, from, sequence: next_sequence(), enqueued_at_ms: now_ms }
    }
}
