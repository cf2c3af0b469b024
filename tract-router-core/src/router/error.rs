//! Routing error taxonomy

use crate::bus::Partition;
use thiserror::Error;

/// Why a route call had no effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The router has been destroyed
    #[error("invalid handle: router has been destroyed")]
    InvalidHandle,

    /// Target partition queue is at capacity
    #[error("queue full: {partition} partition at capacity {capacity}")]
    QueueFull {
        partition: Partition,
        capacity: usize,
    },

    /// Output buffer cannot hold the response
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Bad framing, unknown type tag or out-of-range priority
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Partition tag outside the known set
    #[error("unknown partition tag: {0}")]
    UnknownPartition(i32),
}

impl RouteError {
    /// Negative status code used at the foreign-call boundary
    pub fn code(&self) -> i32 {
        match self {
            RouteError::InvalidHandle => -1,
            RouteError::QueueFull { .. } => -2,
            RouteError::BufferTooSmall { .. } => -3,
            RouteError::MalformedRequest(_) => -4,
            RouteError::UnknownPartition(_) => -5,
        }
    }

    /// Whether retrying the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RouteError::QueueFull { .. } | RouteError::BufferTooSmall { .. }
        )
    }
}

/// A failed route. The payload is handed back untouched.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Rejected {
    #[source]
    pub error: RouteError,
    pub payload: Vec<u8>,
}

impl Rejected {
    pub fn new(error: RouteError, payload: Vec<u8>) -> Self {
        Self { error, payload }
    }

    pub fn code(&self) -> i32 {
        self.error.code()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Router construction failed; no router exists
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot allocate router with capacity {capacity}: {reason}")]
pub struct AllocationError {
    pub capacity: usize,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RouteError::InvalidHandle.code(), -1);
        assert_eq!(
            RouteError::QueueFull {
                partition: Partition::Internal,
                capacity: 1
            }
            .code(),
            -2
        );
        assert_eq!(
            RouteError::BufferTooSmall {
                needed: 8,
                available: 0
            }
            .code(),
            -3
        );
        assert_eq!(RouteError::MalformedRequest("x".into()).code(), -4);
        assert_eq!(RouteError::UnknownPartition(7).code(), -5);
    }

    #[test]
    fn test_recoverable() {
        assert!(RouteError::QueueFull {
            partition: Partition::External,
            capacity: 4
        }
        .is_recoverable());
        assert!(!RouteError::InvalidHandle.is_recoverable());
        assert!(!RouteError::UnknownPartition(3).is_recoverable());
    }

    #[test]
    fn test_rejected_display_and_payload() {
        let rejected = Rejected::new(RouteError::InvalidHandle, b"keep me".to_vec());
        assert_eq!(
            rejected.to_string(),
            "invalid handle: router has been destroyed"
        );
        assert_eq!(rejected.code(), -1);
        assert_eq!(rejected.into_payload(), b"keep me".to_vec());
    }
}
