//! napbridge-storage — idempotent storage backends for napbridge events.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//! - [`postgres`] — PostgreSQL via `sqlx` (production)
//!
//! Every backend writes into a `qq_messages` table (or its in-memory
//! equivalent) with a uniqueness constraint over
//! `(post_type, message_id, timestamp)` and treats a repeated key as a no-op.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "memory")]
pub use memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresStore};
