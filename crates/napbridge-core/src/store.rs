//! The `EventStore` trait and the store boundary used by the listener.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::event::{DedupKey, Event, StoredRecord};

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted,
    /// A row with the same dedup key already existed; nothing was written.
    Duplicate,
}

/// Outcome of one delivery attempt as seen by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Inserted,
    Duplicate,
    /// The store failed; the event is lost.
    Dropped,
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted => write!(f, "inserted"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

impl From<InsertOutcome> for Delivery {
    fn from(o: InsertOutcome) -> Self {
        match o {
            InsertOutcome::Inserted => Self::Inserted,
            InsertOutcome::Duplicate => Self::Duplicate,
        }
    }
}

/// Durable, idempotent event storage.
///
/// # Contract
/// - `insert` writes at most one row per [`DedupKey`]; a repeated key
///   returns `Ok(InsertOutcome::Duplicate)`, never an error.
/// - Rows are never updated or deleted.
/// - Any pooled resource taken by `insert` is released before it returns,
///   whatever the outcome.
///
/// The trait is object-safe and can be stored as `Arc<dyn EventStore>`.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persist one event unless its dedup key is already present.
    async fn insert(&self, event: &Event) -> Result<InsertOutcome, BridgeError>;

    /// Look up the row stored under `key`.
    async fn find(&self, key: &DedupKey) -> Result<Option<StoredRecord>, BridgeError>;

    /// Total number of stored rows.
    async fn count(&self) -> Result<u64, BridgeError>;

    /// Backend name for log lines (`"postgres"`, `"sqlite"`, `"memory"`).
    fn name(&self) -> &str;
}

/// Hand one event to `store` and log the outcome.
///
/// Exactly one log line is emitted per call. Failures are logged at error
/// level and reported as [`Delivery::Dropped`]; they are never returned.
pub async fn deliver(store: &dyn EventStore, event: &Event) -> Delivery {
    match store.insert(event).await {
        Ok(outcome) => {
            let delivery = Delivery::from(outcome);
            tracing::info!(
                store = store.name(),
                post_type = event.post_type.as_deref().unwrap_or("-"),
                message_id = event.message_id,
                time = event.time,
                outcome = %delivery,
                excerpt = %event.excerpt(),
                "event stored"
            );
            delivery
        }
        Err(e) => {
            tracing::error!(
                store = store.name(),
                post_type = event.post_type.as_deref().unwrap_or("-"),
                message_id = event.message_id,
                time = event.time,
                error = %e,
                excerpt = %event.excerpt(),
                "failed to store event, dropping it"
            );
            Delivery::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct KeySet(Mutex<HashSet<DedupKey>>);

    #[async_trait]
    impl EventStore for KeySet {
        async fn insert(&self, event: &Event) -> Result<InsertOutcome, BridgeError> {
            let key = event.dedup_key()?;
            if self.0.lock().unwrap().insert(key) {
                Ok(InsertOutcome::Inserted)
            } else {
                Ok(InsertOutcome::Duplicate)
            }
        }
        async fn find(&self, _key: &DedupKey) -> Result<Option<StoredRecord>, BridgeError> {
            Ok(None)
        }
        async fn count(&self) -> Result<u64, BridgeError> {
            Ok(self.0.lock().unwrap().len() as u64)
        }
        fn name(&self) -> &str {
            "keyset"
        }
    }

    #[tokio::test]
    async fn deliver_maps_outcomes() {
        let store = KeySet::default();
        let ev = Event::from_frame(r#"{"post_type":"message","message_id":1,"time":10}"#).unwrap();
        assert_eq!(deliver(&store, &ev).await, Delivery::Inserted);
        assert_eq!(deliver(&store, &ev).await, Delivery::Duplicate);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deliver_swallows_store_errors() {
        let store = KeySet::default();
        let ev = Event::from_frame(&format!(r#"{{"time":{}}}"#, i64::MIN)).unwrap();
        assert_eq!(deliver(&store, &ev).await, Delivery::Dropped);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
