/// Dispatch counters
use crate::dispatch::DispatchOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the dispatch loop.
#[derive(Debug, Default)]
pub struct BusStats {
    received: AtomicU64,
    delivered: AtomicU64,
    unrouted: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    transport_errors: AtomicU64,
}

/// Point-in-time copy of [`BusStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStatsSnapshot {
    /// Messages taken off the transport
    pub received: u64,
    /// Messages whose handler completed successfully
    pub delivered: u64,
    /// Messages on channels without a handler
    pub unrouted: u64,
    /// Messages whose handler returned an error
    pub failed: u64,
    /// Messages whose handler panicked
    pub panicked: u64,
    /// Receive errors reported by the transport
    pub transport_errors: u64,
}

impl BusStatsSnapshot {
    pub fn failures(&self) -> u64 {
        self.failed + self.panicked
    }
}

impl BusStats {
    pub(crate) fn record(&self, outcome: &DispatchOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DispatchOutcome::Delivered { .. } => &self.delivered,
            DispatchOutcome::Unrouted { .. } => &self.unrouted,
            DispatchOutcome::Failed { .. } => &self.failed,
            DispatchOutcome::Panicked { .. } => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}
