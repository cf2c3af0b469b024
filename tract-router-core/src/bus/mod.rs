//! Message envelope and per-partition queues
//!
//! Every message crossing between the Internal and External partitions is
//! wrapped in a [`Message`] envelope and parked in the target partition's
//! [`PriorityQueue`] until that partition drains it.

pub mod envelope;
pub mod queue;

pub use envelope::{Message, Partition, Priority, Target};
pub use queue::{PriorityQueue, QueueFull};
