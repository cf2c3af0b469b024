//! Status codes shared with foreign callers

use tract_router_core::router::STATUS_RESPONSE_MAX;
use tract_router_core::RouteError;

/// Success
pub const TRACT_OK: i32 = 0;
/// Handle is null or the router has been destroyed
pub const TRACT_ERR_INVALID_HANDLE: i32 = -1;
/// Target partition queue is at capacity
pub const TRACT_ERR_QUEUE_FULL: i32 = -2;
/// Output buffer cannot hold the response
pub const TRACT_ERR_BUFFER_TOO_SMALL: i32 = -3;
/// Bad framing, unknown type tag, bad priority or null payload
pub const TRACT_ERR_MALFORMED: i32 = -4;
/// Partition tag outside 0/1 (or 0/1/2 for route targets)
pub const TRACT_ERR_UNKNOWN_PARTITION: i32 = -5;

/// Upper bound on the `status` Bridge response, in bytes
pub const TRACT_STATUS_RESPONSE_MAX: usize = STATUS_RESPONSE_MAX;

/// Drain produced a message
pub const TRACT_DRAIN_MESSAGE: i32 = TRACT_OK;
/// Drain found the queue empty
pub const TRACT_DRAIN_EMPTY: i32 = 1;

/// Map a routing error onto its boundary code
pub fn error_code(error: &RouteError) -> i32 {
    match error {
        RouteError::InvalidHandle => TRACT_ERR_INVALID_HANDLE,
        RouteError::QueueFull { .. } => TRACT_ERR_QUEUE_FULL,
        RouteError::BufferTooSmall { .. } => TRACT_ERR_BUFFER_TOO_SMALL,
        RouteError::MalformedRequest(_) => TRACT_ERR_MALFORMED,
        RouteError::UnknownPartition(_) => TRACT_ERR_UNKNOWN_PARTITION,
    }
}
