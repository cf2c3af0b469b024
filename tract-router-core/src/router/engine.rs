//! Router lifecycle, routing and draining

use super::classifier::{fnv1a64, BridgeRequest, Classifier, HandlerCategory};
use super::error::{AllocationError, Rejected, RouteError};
use super::response::{Response, ACK_LEN};
use super::stats::{RouterStats, StatsSnapshot};
use crate::bus::{Message, Partition, Priority, PriorityQueue, Target};
use crate::config::RouterConfig;
use crate::utils::preview_payload;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Largest capacity a router accepts
pub const MAX_CAPACITY: usize = 1 << 24;

/// Upper bound on the encoded `status` Bridge response. Every field of
/// [`RouterStatus`] is fixed-width apart from integers, which stay under
/// 20 digits.
pub const STATUS_RESPONSE_MAX: usize = 1024;

/// Router lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterState {
    Created,
    Active,
    Destroyed,
}

/// Messages still queued when the router was destroyed
#[derive(Debug, Default)]
pub struct DestroyReport {
    pub internal: Vec<Message>,
    pub external: Vec<Message>,
}

impl DestroyReport {
    /// Total number of discarded messages
    pub fn discarded(&self) -> usize {
        self.internal.len() + self.external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discarded() == 0
    }
}

/// Queue depth for one partition
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStatus {
    pub partition: Partition,
    pub len: usize,
    pub capacity: usize,
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub critical: usize,
}

/// Snapshot returned by [`Router::status`] and the `status` Bridge tag
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub state: RouterState,
    pub capacity: usize,
    pub next_sequence: u64,
    pub partitions: Vec<PartitionStatus>,
    pub stats: StatsSnapshot,
}

/// Priority router between the Internal and External partitions.
///
/// # Thread Safety
///
/// Every method takes `&self`; share the router behind an `Arc`. Each
/// partition queue has its own mutex. Route and drain hold the shared side
/// of the lifecycle lock for their whole duration, and destroy takes the
/// exclusive side, so destroy waits for in-flight calls to finish.
pub struct Router {
    state: RwLock<RouterState>,
    internal: Mutex<PriorityQueue>,
    external: Mutex<PriorityQueue>,
    classifier: Classifier,
    next_sequence: AtomicU64,
    stats: RouterStats,
    capacity: usize,
}

impl Router {
    /// Create a router whose partition queues each hold `capacity` messages
    pub fn create(capacity: usize) -> Result<Self, AllocationError> {
        if capacity == 0 {
            return Err(AllocationError {
                capacity,
                reason: "capacity must be positive".to_string(),
            });
        }
        if capacity > MAX_CAPACITY {
            return Err(AllocationError {
                capacity,
                reason: format!("capacity exceeds maximum of {}", MAX_CAPACITY),
            });
        }

        let router = Self {
            state: RwLock::new(RouterState::Created),
            internal: Mutex::new(PriorityQueue::new(capacity)),
            external: Mutex::new(PriorityQueue::new(capacity)),
            classifier: Classifier::builtin(),
            next_sequence: AtomicU64::new(1),
            stats: RouterStats::default(),
            capacity,
        };

        *router.state.write() = RouterState::Active;
        info!(
            capacity,
            tags = ?router.classifier.tags(),
            "Router created"
        );
        Ok(router)
    }

    /// Create a router sized from configuration
    pub fn from_config(config: &RouterConfig) -> Result<Self, AllocationError> {
        if config.router.capacity > config.router.max_capacity {
            return Err(AllocationError {
                capacity: config.router.capacity,
                reason: format!(
                    "capacity exceeds configured maximum of {}",
                    config.router.max_capacity
                ),
            });
        }
        Self::create(config.router.capacity)
    }

    pub fn state(&self) -> RouterState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == RouterState::Active
    }

    /// Per-partition capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Build an envelope and route it
    pub fn route(
        &self,
        payload: Vec<u8>,
        priority: Priority,
        source: Partition,
        target: Target,
    ) -> Result<Response, Rejected> {
        self.route_message(Message::new(payload, priority, source, target))
    }

    /// Route a prepared envelope.
    ///
    /// Partition targets are enqueued; the Bridge target is classified and
    /// answered inline without touching either queue. On any error the
    /// router is unchanged and the payload comes back in [`Rejected`].
    pub fn route_message(&self, msg: Message) -> Result<Response, Rejected> {
        let state = self.state.read();
        if *state != RouterState::Active {
            debug!(to = %msg.target(), "Route on destroyed router");
            return Err(Rejected::new(RouteError::InvalidHandle, msg.into_payload()));
        }

        match msg.target() {
            Target::Partition(partition) => self.enqueue(partition, msg),
            Target::Bridge => {
                let result = self.process_inline(msg.payload(), *state);
                match result {
                    Ok(response) => {
                        self.stats.record_bridged();
                        Ok(response)
                    }
                    Err(error) => Err(Rejected::new(error, msg.into_payload())),
                }
            }
        }
    }

    /// Route and write the response into `out`, returning the bytes written.
    ///
    /// The buffer is checked before anything is enqueued, so a
    /// [`RouteError::BufferTooSmall`] leaves the router unchanged.
    pub fn route_into(
        &self,
        payload: Vec<u8>,
        priority: Priority,
        source: Partition,
        target: Target,
        out: &mut [u8],
    ) -> Result<usize, Rejected> {
        let state = self.state.read();
        if *state != RouterState::Active {
            return Err(Rejected::new(RouteError::InvalidHandle, payload));
        }

        let response = match target {
            Target::Partition(partition) => {
                if out.len() < ACK_LEN {
                    return Err(Rejected::new(
                        RouteError::BufferTooSmall {
                            needed: ACK_LEN,
                            available: out.len(),
                        },
                        payload,
                    ));
                }
                self.enqueue(partition, Message::new(payload, priority, source, target))?
            }
            Target::Bridge => {
                let response = match self.process_inline(&payload, *state) {
                    Ok(response) => response,
                    Err(error) => return Err(Rejected::new(error, payload)),
                };
                if let Err(error) = response.write_to(out) {
                    return Err(Rejected::new(error, payload));
                }
                self.stats.record_bridged();
                return Ok(response.encoded_len());
            }
        };

        response
            .write_to(out)
            .map_err(|error| Rejected::new(error, Vec::new()))
    }

    /// Pull the next message for a partition. `None` when the queue is
    /// empty or the router has been destroyed.
    pub fn drain(&self, partition: Partition) -> Option<Message> {
        self.try_drain(partition).ok().flatten()
    }

    /// Like [`drain`](Self::drain) but reports a destroyed router
    pub fn try_drain(&self, partition: Partition) -> Result<Option<Message>, RouteError> {
        let state = self.state.read();
        if *state != RouterState::Active {
            return Err(RouteError::InvalidHandle);
        }

        let msg = self.queue(partition).lock().dequeue();
        if let Some(msg) = &msg {
            self.stats.record_drained();
            debug!(
                partition = %partition,
                priority = %msg.priority(),
                sequence = msg.sequence_tag(),
                payload = %preview_payload(msg.payload(), 48),
                "Drained message"
            );
        }
        Ok(msg)
    }

    /// Current length of a partition queue
    pub fn len(&self, partition: Partition) -> usize {
        self.queue(partition).lock().len()
    }

    pub fn is_empty(&self, partition: Partition) -> bool {
        self.len(partition) == 0
    }

    /// Transition to Destroyed and hand back whatever was still queued.
    ///
    /// Waits for in-flight route and drain calls. Calling it again is a
    /// no-op that returns an empty report.
    pub fn destroy(&self) -> DestroyReport {
        let mut state = self.state.write();
        if *state == RouterState::Destroyed {
            debug!("Router already destroyed");
            return DestroyReport::default();
        }
        *state = RouterState::Destroyed;

        let report = DestroyReport {
            internal: self.internal.lock().clear(),
            external: self.external.lock().clear(),
        };
        self.stats.record_discarded(report.discarded());

        if report.is_empty() {
            info!("Router destroyed");
        } else {
            warn!(
                internal = report.internal.len(),
                external = report.external.len(),
                "Router destroyed with undrained messages; discarding"
            );
        }
        report
    }

    /// Queue depths, lifecycle state and counters
    pub fn status(&self) -> RouterStatus {
        let state = self.state.read();
        self.status_with(*state)
    }

    fn status_with(&self, state: RouterState) -> RouterStatus {
        let partitions = Partition::ALL
            .iter()
            .map(|&partition| {
                let queue = self.queue(partition).lock();
                let depths = queue.depths();
                PartitionStatus {
                    partition,
                    len: queue.len(),
                    capacity: queue.capacity(),
                    low: depths[Priority::Low.index()],
                    normal: depths[Priority::Normal.index()],
                    high: depths[Priority::High.index()],
                    critical: depths[Priority::Critical.index()],
                }
            })
            .collect();

        RouterStatus {
            state,
            capacity: self.capacity,
            next_sequence: self.next_sequence.load(Ordering::Relaxed),
            partitions,
            stats: self.stats.snapshot(),
        }
    }

    fn queue(&self, partition: Partition) -> &Mutex<PriorityQueue> {
        match partition {
            Partition::Internal => &self.internal,
            Partition::External => &self.external,
        }
    }

    fn enqueue(&self, partition: Partition, mut msg: Message) -> Result<Response, Rejected> {
        let mut queue = self.queue(partition).lock();
        if queue.is_full() {
            let capacity = queue.capacity();
            drop(queue);
            self.stats.record_rejected();
            warn!(
                partition = %partition,
                priority = %msg.priority(),
                capacity,
                payload = %preview_payload(msg.payload(), 48),
                "Queue full, returning message to caller"
            );
            return Err(Rejected::new(
                RouteError::QueueFull {
                    partition,
                    capacity,
                },
                msg.into_payload(),
            ));
        }

        // Drawn under the queue lock so tag order matches insertion order.
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        msg.stamp(sequence);
        let priority = msg.priority();

        if let Err(full) = queue.enqueue(msg) {
            let capacity = full.capacity;
            return Err(Rejected::new(
                RouteError::QueueFull {
                    partition,
                    capacity,
                },
                full.into_message().into_payload(),
            ));
        }
        drop(queue);

        self.stats.record_routed();
        debug!(
            partition = %partition,
            priority = %priority,
            sequence,
            "Enqueued message"
        );
        Ok(Response::Queued {
            partition,
            sequence,
        })
    }

    fn process_inline(&self, payload: &[u8], state: RouterState) -> Result<Response, RouteError> {
        let request = BridgeRequest::parse(payload)?;
        let category = self.classifier.classify(request.tag).ok_or_else(|| {
            warn!(tag = %request.tag, "Unknown bridge type tag");
            RouteError::MalformedRequest(format!("unknown type tag '{}'", request.tag))
        })?;

        let body = match category {
            HandlerCategory::Heartbeat => b"pong".to_vec(),
            HandlerCategory::Echo => request.body.to_vec(),
            HandlerCategory::Introspection => serde_json::to_vec(&self.status_with(state))
                .map_err(|e| RouteError::MalformedRequest(format!("status encoding: {}", e)))?,
            HandlerCategory::Digest => fnv1a64(request.body).to_le_bytes().to_vec(),
        };

        debug!(
            tag = %request.tag,
            category = %category,
            response_len = body.len(),
            "Processed bridge request inline"
        );
        Ok(Response::Inline { category, body })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("state", &self.state())
            .field("capacity", &self.capacity)
            .field("internal_len", &self.len(Partition::Internal))
            .field("external_len", &self.len(Partition::External))
            .finish()
    }
}
