//! Delay-priority scheduler: a min-heap keyed by `execute_at`, drained on a
//! fixed tick. Recurring entries are re-armed after dispatch; cancellation
//! removes by id in O(n) (the heap is not indexed by id, but scheduled-entry
//! counts are expected to stay small relative to actor traffic, preferring
//! a simple structure over premature indexing).

use crate::effect::ActorMessageEnvelope;
use crate::ids::ActorAddress;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct ScheduledEntry {
    pub id: String,
    pub to: ActorAddress,
    pub message: ActorMessageEnvelope,
    pub execute_at_ms: i64,
    pub interval_ms: Option<u64>,
    /// Insertion order, used only to break ties when `execute_at_ms` is
    /// equal: messages with identical `execute_at_ms` are delivered in
    /// insertion order.
    sequence: u64,
}

/// Min-heap by `(execute_at_ms, sequence)`; `BinaryHeap` is a max-heap, so
/// ordering is reversed.
impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .execute_at_ms
            .cmp(&self.execute_at_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.execute_at_ms == other.execute_at_ms && self.sequence == other.sequence
    }
}

impl Eq for ScheduledEntry {}

#[derive(Default)]
pub struct Scheduler {
    heap: BinaryHeap<ScheduledEntry>,
    next_sequence: u64,
    /// Ids cancelled before their entry was popped off the heap; checked
    /// (and cleared) on pop so cancellation is O(1) to record.
    cancelled: std::collections::HashSet<String>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(
        &mut self,
        id: String,
        to: ActorAddress,
        message: ActorMessageEnvelope,
        now_ms: i64,
        delay_ms: u64,
        recurring: bool,
    ) {
        self.cancelled.remove(&id);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledEntry {
            id,
            to,
            message,
            execute_at_ms: now_ms + delay_ms as i64,
            interval_ms: recurring.then_some(delay_ms),
            sequence,
        });
    }

    pub fn cancel(&mut self, id: &str) {
        self.cancelled.insert(id.to_string());
    }

    /// Pops every entry due at or before `now_ms`, re-arming recurring ones
    /// for their next tick. Cancelled entries are dropped silently.
    pub fn drain_due(&mut self, now_ms: i64) -> Vec<ScheduledEntry> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.execute_at_ms > now_ms {
                break;
            }
            let entry = self.heap.pop().expect("peeked entry must pop");
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            if let Some(interval_ms) = entry.interval_ms {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.heap.push(ScheduledEntry {
                    id: entry.id.clone(),
                    to: entry.to.clone(),
                    message: entry.message.clone(),
                    execute_at_ms: entry.execute_at_ms + interval_ms as i64,
                    interval_ms: Some(interval_ms),
                    sequence,
                });
            }
            due.push(entry);
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::room::RoomMessage;
    use crate::ids::RoomId;

    fn msg() -> ActorMessageEnvelope {
        ActorMessageEnvelope::Room(RoomMessage::RoomTick { now_ms: 0 })
    }

    #[test]
    fn cancel_before_due_suppresses_delivery() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("s1".into(), ActorAddress::room(&RoomId::new("r1")), msg(), 0, 200, false);
        scheduler.cancel("s1");
        let due = scheduler.drain_due(1_000);
        assert!(due.is_empty());
    }

    #[test]
    fn identical_execute_at_delivered_in_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("first".into(), ActorAddress::room(&RoomId::new("r1")), msg(), 0, 100, false);
        scheduler.schedule("second".into(), ActorAddress::room(&RoomId::new("r1")), msg(), 0, 100, false);
        let due = scheduler.drain_due(100);
        assert_eq!(due.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn recurring_entry_reschedules_after_dispatch() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule("r1".into(), ActorAddress::room(&RoomId::new("r1")), msg(), 0, 500, true);
        let first = scheduler.drain_due(500);
        assert_eq!(first.len(), 1);
        assert!(scheduler.drain_due(999).is_empty());
        let second = scheduler.drain_due(1_000);
        assert_eq!(second.len(), 1);
    }
}
