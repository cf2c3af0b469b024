//! Message envelope and routing tags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery priority. Higher variants are drained first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Number of priority levels
    pub const COUNT: usize = 4;

    /// All levels, highest first (drain order)
    pub const DESCENDING: [Priority; Self::COUNT] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Parse the boundary code (0-3)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Priority::Low),
            1 => Some(Priority::Normal),
            2 => Some(Priority::High),
            3 => Some(Priority::Critical),
            _ => None,
        }
    }

    /// Bucket index for this level
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two queued processing partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Planning-oriented tract
    Internal,
    /// Execution-oriented tract
    External,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Internal, Partition::External];

    /// Parse the boundary code (0 = Internal, 1 = External)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Partition::Internal),
            1 => Some(Partition::External),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Internal => "internal",
            Partition::External => "external",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a routed message goes: a partition queue or the inline bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Partition(Partition),
    Bridge,
}

impl Target {
    /// Parse the boundary code (0/1 = partitions, 2 = Bridge)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            2 => Some(Target::Bridge),
            other => Partition::from_code(other).map(Target::Partition),
        }
    }
}

impl From<Partition> for Target {
    fn from(partition: Partition) -> Self {
        Target::Partition(partition)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Partition(p) => p.fmt(f),
            Target::Bridge => f.write_str("bridge"),
        }
    }
}

/// A payload plus its routing metadata.
///
/// The envelope owns its payload. Ownership moves into the router when the
/// message is accepted and back out through [`Message::into_payload`] when
/// it is drained; the bytes themselves are never copied.
#[derive(Debug)]
pub struct Message {
    payload: Vec<u8>,
    priority: Priority,
    source: Partition,
    target: Target,
    sequence: u64,
    enqueued_at: DateTime<Utc>,
}

impl Message {
    /// Create a new envelope. The sequence tag is assigned by the router.
    pub fn new(payload: Vec<u8>, priority: Priority, source: Partition, target: Target) -> Self {
        Self {
            payload,
            priority,
            source,
            target,
            sequence: 0,
            enqueued_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn source(&self) -> Partition {
        self.source
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Router-assigned tie breaker; 0 until the message has been accepted
    pub fn sequence_tag(&self) -> u64 {
        self.sequence
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Give the payload back to the caller
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub(crate) fn stamp(&mut self, sequence: u64) {
        self.sequence = sequence;
        self.enqueued_at = Utc::now();
    }
}
