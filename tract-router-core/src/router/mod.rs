//! Router core
//!
//! ```text
//!  route(msg) ──┬── target Internal ──► [Internal queue] ──► drain(Internal)
//!               ├── target External ──► [External queue] ──► drain(External)
//!               └── target Bridge ────► classify ─► inline handler ─► Response
//! ```
//!
//! Queued routes are acknowledged with the assigned sequence tag. Bridge
//! routes never touch a queue and answer within the same call.

pub mod classifier;
mod engine;
pub mod error;
pub mod response;
pub mod stats;

pub use classifier::{encode_bridge_request, BridgeRequest, Classifier, HandlerCategory};
pub use engine::{
    DestroyReport, PartitionStatus, Router, RouterState, RouterStatus, MAX_CAPACITY,
    STATUS_RESPONSE_MAX,
};
pub use error::{AllocationError, Rejected, RouteError};
pub use response::{Response, ACK_LEN};
pub use stats::{RouterStats, StatsSnapshot};
