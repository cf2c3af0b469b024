//! Bounded priority queue
//!
//! One FIFO bucket per priority level. Dequeue scans the buckets from
//! Critical down to Low and pops the front of the first non-empty one, so
//! ordering is strict priority first and arrival order within a level.

use super::envelope::{Message, Priority};
use std::collections::VecDeque;
use thiserror::Error;

/// Returned by [`PriorityQueue::enqueue`] when the queue is at capacity.
///
/// Carries the rejected message so the caller gets its payload back.
#[derive(Error, Debug)]
#[error("queue full (capacity {capacity})")]
pub struct QueueFull {
    pub message: Message,
    pub capacity: usize,
}

impl QueueFull {
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// Per-partition container with a hard capacity ceiling
#[derive(Debug)]
pub struct PriorityQueue {
    buckets: [VecDeque<Message>; Priority::COUNT],
    len: usize,
    capacity: usize,
}

impl PriorityQueue {
    /// Create an empty queue. `capacity` must be positive; the router
    /// checks this before construction.
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: Default::default(),
            len: 0,
            capacity,
        }
    }

    /// Insert a message behind every stored message of the same priority.
    /// Leaves the queue untouched when full.
    pub fn enqueue(&mut self, msg: Message) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull {
                message: msg,
                capacity: self.capacity,
            });
        }

        let bucket = &mut self.buckets[msg.priority().index()];
        debug_assert!(bucket
            .back()
            .map_or(true, |last| last.sequence_tag() < msg.sequence_tag()));
        bucket.push_back(msg);
        self.len += 1;
        Ok(())
    }

    /// Remove the highest-priority, oldest-among-ties message
    pub fn dequeue(&mut self) -> Option<Message> {
        for priority in Priority::DESCENDING {
            if let Some(msg) = self.buckets[priority.index()].pop_front() {
                self.len -= 1;
                return Some(msg);
            }
        }
        None
    }

    /// The message the next [`dequeue`](Self::dequeue) would return
    pub fn peek(&self) -> Option<&Message> {
        Priority::DESCENDING
            .iter()
            .find_map(|p| self.buckets[p.index()].front())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored messages per priority, indexed by [`Priority::index`]
    pub fn depths(&self) -> [usize; Priority::COUNT] {
        let mut depths = [0; Priority::COUNT];
        for (depth, bucket) in depths.iter_mut().zip(&self.buckets) {
            *depth = bucket.len();
        }
        depths
    }

    /// Remove everything, returned in drain order
    pub fn clear(&mut self) -> Vec<Message> {
        let mut drained = Vec::with_capacity(self.len);
        while let Some(msg) = self.dequeue() {
            drained.push(msg);
        }
        drained
    }
}
