//! Core types for tract-router
//!
//! This crate provides the message envelope, the bounded priority queue,
//! the dispatch classifier and the router that connects the Internal and
//! External partitions, plus the configuration and logging shared by the
//! boundary adapter and the CLI.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;
pub mod utils;

pub use bus::{Message, Partition, Priority, PriorityQueue, QueueFull, Target};
pub use error::{Error, Result};
pub use router::{
    AllocationError, DestroyReport, HandlerCategory, Rejected, Response, RouteError, Router,
    RouterState,
};
