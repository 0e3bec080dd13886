//! napbridge-core — shared types for the napbridge ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//! StreamListener (napbridge-ws)
//!     └── Event::from_frame ──▶ deliver ──▶ EventStore (napbridge-storage)
//!                                              ├── PostgresStore
//!                                              ├── SqliteStore
//!                                              └── InMemoryStore
//! ```
//!
//! - [`Event`] / [`DedupKey`] — decoded frame and its uniqueness triple
//! - [`EventStore`] — idempotent persistence trait
//! - [`deliver`] — the store boundary: log once, never propagate
//! - [`BridgeError`] — structured error type
//! - [`SessionState`] — listener connection lifecycle

pub mod error;
pub mod event;
pub mod session;
pub mod store;

pub use error::BridgeError;
pub use event::{DedupKey, Event, StoredRecord};
pub use session::{SessionEnd, SessionState};
pub use store::{deliver, Delivery, EventStore, InsertOutcome};
