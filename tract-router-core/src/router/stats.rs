//! Router counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by route, drain and destroy
#[derive(Debug, Default)]
pub struct RouterStats {
    routed: AtomicU64,
    rejected: AtomicU64,
    bridged: AtomicU64,
    drained: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Messages accepted into a partition queue
    pub routed: u64,
    /// Messages refused because the target queue was full
    pub rejected: u64,
    /// Bridge requests answered inline
    pub bridged: u64,
    /// Messages handed out by drain
    pub drained: u64,
    /// Messages dropped by destroy
    pub discarded: u64,
}

impl StatsSnapshot {
    /// Accepted messages not yet drained or discarded
    pub fn in_flight(&self) -> u64 {
        self.routed
            .saturating_sub(self.drained)
            .saturating_sub(self.discarded)
    }
}

impl RouterStats {
    pub(crate) fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bridged(&self) {
        self.bridged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drained(&self) {
        self.drained.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            routed: self.routed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            bridged: self.bridged.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = RouterStats::default();
        stats.record_routed();
        stats.record_routed();
        stats.record_routed();
        stats.record_drained();
        stats.record_discarded(1);
        stats.record_rejected();
        stats.record_bridged();

        let snap = stats.snapshot();
        assert_eq!(snap.routed, 3);
        assert_eq!(snap.drained, 1);
        assert_eq!(snap.discarded, 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.bridged, 1);
        assert_eq!(snap.in_flight(), 1);
    }
}
