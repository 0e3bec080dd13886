//! SQLite storage backend for napbridge.
//!
//! Persists events to a single SQLite file with the same table layout and
//! dedup semantics as the Postgres backend. Uses `sqlx` with WAL mode.
//!
//! # Usage
//! ```rust,no_run
//! use napbridge_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./messages.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use napbridge_core::error::BridgeError;
use napbridge_core::event::{DedupKey, Event, StoredRecord};
use napbridge_core::store::{EventStore, InsertOutcome};

// Missing post_types must collide, so the unique index folds NULL into ''.
const INSERT_SQL: &str = "INSERT INTO qq_messages (post_type, message_id, timestamp, raw)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT DO NOTHING";

/// SQLite-backed event store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./messages.db"`) or a full
    /// SQLite URL (`"sqlite:./messages.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(|e| BridgeError::Storage(format!("sqlite open: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would see its own empty database, so the pool
    /// holds exactly one connection that is never recycled. All data is lost
    /// when the store is dropped.
    pub async fn in_memory() -> Result<Self, BridgeError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(2))
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::Storage(format!("sqlite open: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the table and dedup index if they don't already exist.
    async fn init_schema(&self) -> Result<(), BridgeError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS qq_messages (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                post_type  TEXT,
                message_id INTEGER NOT NULL,
                timestamp  TEXT    NOT NULL,
                raw        TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS qq_messages_dedup
             ON qq_messages (IFNULL(post_type, ''), message_id, timestamp);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(e.to_string()))?;

        debug!("SqliteStore schema initialized");
        Ok(())
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert(&self, event: &Event) -> Result<InsertOutcome, BridgeError> {
        let record = StoredRecord::from_event(event)?;

        // The pool slot goes back on drop, whichever `?` below fires.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| BridgeError::Storage(format!("acquire connection: {e}")))?;

        let mut tx = sqlx::Connection::begin(&mut *conn)
            .await
            .map_err(|e| BridgeError::Storage(format!("begin: {e}")))?;

        let result = sqlx::query(INSERT_SQL)
            .bind(&record.post_type)
            .bind(record.message_id)
            .bind(record.timestamp)
            .bind(&record.raw)
            .execute(&mut *tx)
            .await
            .map_err(|e| BridgeError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| BridgeError::Storage(format!("commit: {e}")))?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn find(&self, key: &DedupKey) -> Result<Option<StoredRecord>, BridgeError> {
        let row = sqlx::query(
            "SELECT post_type, message_id, timestamp, raw FROM qq_messages
             WHERE IFNULL(post_type, '') = IFNULL(?1, '')
               AND message_id = ?2
               AND timestamp = ?3",
        )
        .bind(&key.post_type)
        .bind(key.message_id)
        .bind(key.occurred_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(e.to_string()))?;

        row.map(|r| {
            Ok(StoredRecord {
                post_type: r.try_get::<Option<String>, _>("post_type")?,
                message_id: r.try_get::<i64, _>("message_id")?,
                timestamp: r.try_get::<NaiveDateTime, _>("timestamp")?,
                raw: r.try_get::<String, _>("raw")?,
            })
        })
        .transpose()
        .map_err(|e: sqlx::Error| BridgeError::Storage(e.to_string()))
    }

    async fn count(&self) -> Result<u64, BridgeError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qq_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(e.to_string()))?;
        Ok(n as u64)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
