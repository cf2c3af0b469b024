//! Responses returned from route

use super::classifier::HandlerCategory;
use super::error::RouteError;
use crate::bus::Partition;

/// Size of the acknowledgement written for a queued message
pub const ACK_LEN: usize = 8;

/// Outcome of a successful route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The message is parked in a partition queue
    Queued { partition: Partition, sequence: u64 },
    /// A Bridge request was answered inline
    Inline {
        category: HandlerCategory,
        body: Vec<u8>,
    },
}

impl Response {
    /// Sequence tag assigned to a queued message
    pub fn sequence_tag(&self) -> Option<u64> {
        match self {
            Response::Queued { sequence, .. } => Some(*sequence),
            Response::Inline { .. } => None,
        }
    }

    /// Bytes [`write_to`](Self::write_to) produces
    pub fn encoded_len(&self) -> usize {
        match self {
            Response::Queued { .. } => ACK_LEN,
            Response::Inline { body, .. } => body.len(),
        }
    }

    /// Serialize into a caller buffer. Queued responses are the sequence
    /// tag as little-endian u64; inline responses are the handler output.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize, RouteError> {
        let needed = self.encoded_len();
        if out.len() < needed {
            return Err(RouteError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        match self {
            Response::Queued { sequence, .. } => {
                out[..ACK_LEN].copy_from_slice(&sequence.to_le_bytes());
            }
            Response::Inline { body, .. } => {
                out[..needed].copy_from_slice(body);
            }
        }
        Ok(needed)
    }
}
