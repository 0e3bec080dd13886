//! Counters kept by the stream listener.

use std::sync::atomic::{AtomicU64, Ordering};

use napbridge_core::store::Delivery;

/// Running totals since the listener was created. Shared via `Arc`.
#[derive(Debug, Default)]
pub struct ListenerStats {
    sessions: AtomicU64,
    frames: AtomicU64,
    decode_failures: AtomicU64,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ListenerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful handshakes.
    pub sessions: u64,
    /// Data frames received (text or binary).
    pub frames: u64,
    pub decode_failures: u64,
    pub inserted: u64,
    pub duplicates: u64,
    /// Events lost to a store failure.
    pub dropped: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_session(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Inserted => &self.inserted,
            Delivery::Duplicate => &self.duplicates,
            Delivery::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions: self.sessions.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
