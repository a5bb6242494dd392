// src/retention.rs
//
// In-memory retention queue for received messages.
//
// Insertion-ordered (oldest first), swept lazily on the sweep tick rather
// than eagerly on insert. The queue is a best-effort cache of recent
// activity; the durable table in message_db is the system of record.
//
// The poll task and the sweep task both touch the queue, so it is shared
// as `Arc<Mutex<RetentionStore>>`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::io::MessageRecord;

/// Shared handle used by the poll and sweep tasks.
pub type SharedRetention = Arc<Mutex<RetentionStore>>;

/// Ordered, timestamped queue of received messages with TTL expiry.
#[derive(Debug, Default)]
pub struct RetentionStore {
    queue: VecDeque<MessageRecord>,
}

impl RetentionStore {
    pub fn new() -> Self {
        RetentionStore {
            queue: VecDeque::new(),
        }
    }

    pub fn shared() -> SharedRetention {
        Arc::new(Mutex::new(RetentionStore::new()))
    }

    /// Append a record to the end of the queue. No deduplication.
    pub fn append(&mut self, record: MessageRecord) {
        self.queue.push_back(record);
    }

    /// Remove and return every record whose age meets or exceeds `ttl`.
    ///
    /// Idempotent: a second call with the same `now_us` evicts nothing
    /// further. The boundary is inclusive: age exactly equal to the TTL is
    /// evicted.
    pub fn sweep(&mut self, now_us: u64, ttl: Duration) -> Vec<MessageRecord> {
        let ttl_us = ttl.as_micros() as u64;
        let mut evicted = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());

        // Replayed rows can interleave timestamps with live arrivals, so
        // every record is checked rather than assuming a sorted prefix.
        for record in self.queue.drain(..) {
            if record.age_us(now_us) >= ttl_us {
                evicted.push(record);
            } else {
                kept.push_back(record);
            }
        }
        self.queue = kept;
        evicted
    }

    /// Ordered read-only view for rendering; reflects the most recent sweep.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
