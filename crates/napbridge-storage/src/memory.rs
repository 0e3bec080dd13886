//! In-memory storage backend.
//!
//! Keeps stored records in a map keyed by their dedup triple.
//! Useful for tests and dry runs that don't need persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use napbridge_core::error::BridgeError;
use napbridge_core::event::{DedupKey, Event, StoredRecord};
use napbridge_core::store::{EventStore, InsertOutcome};

type RejectFn = Box<dyn Fn(&Event) -> bool + Send + Sync>;

/// In-memory event store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<DedupKey, StoredRecord>>,
    order: Mutex<Vec<DedupKey>>,
    reject: Option<RejectFn>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every insert for which `predicate` returns `true`, as a backend
    /// rejecting a row would.
    pub fn rejecting<F>(predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self {
            reject: Some(Box::new(predicate)),
            ..Self::default()
        }
    }

    /// All stored records in insertion order.
    pub fn records(&self) -> Vec<StoredRecord> {
        let records = self.records.lock().unwrap();
        self.order
            .lock()
            .unwrap()
            .iter()
            .filter_map(|k| records.get(k).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert(&self, event: &Event) -> Result<InsertOutcome, BridgeError> {
        if self.reject.as_ref().is_some_and(|f| f(event)) {
            return Err(BridgeError::Storage("row rejected by store".into()));
        }
        let record = StoredRecord::from_event(event)?;
        let key = record.key();

        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }
        records.insert(key.clone(), record);
        self.order.lock().unwrap().push(key);
        Ok(InsertOutcome::Inserted)
    }

    async fn find(&self, key: &DedupKey) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn count(&self) -> Result<u64, BridgeError> {
        Ok(self.len() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
