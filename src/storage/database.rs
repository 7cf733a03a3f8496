//! # Database
//!
//! SQLite-backed transactional document store.
//!
//! ## Database Operations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DATABASE OPERATIONS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │   Application   │                                                    │
//! │  └────────┬────────┘                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │    Database     │  Document API                                      │
//! │  │   (this file)   │  - get/put/delete by (collection, id)              │
//! │  │                 │  - structured queries (Query)                      │
//! │  │                 │  - atomic multi-document transactions              │
//! │  │                 │  - live query watching                             │
//! │  └────────┬────────┘                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │    rusqlite     │  SQLite wrapper                                    │
//! │  │                 │  - Prepared statements                             │
//! │  │                 │  - JSON1 field extraction                          │
//! │  └────────┬────────┘                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                    │
//! │  │   SQLite DB     │  Storage                                           │
//! │  │   (file or      │  - In-memory for tests                             │
//! │  │    memory)      │  - File for production                             │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Semantics
//!
//! [`Database::run_atomic`] runs a closure against an immediate SQLite
//! transaction. Every read inside the closure sees a consistent snapshot,
//! every write lands together or not at all, and returning an error from
//! the closure rolls the whole transaction back and surfaces that error
//! unchanged. Lock contention on begin or commit is retried with jittered
//! backoff up to the configured attempt budget; application errors are
//! never retried. Watchers are notified only after a successful commit.

use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::query::Query;
use super::schema;
use super::watch::{Subscription, WatchRegistry};
use crate::error::{Error, Result};

/// Default retry budget for contended atomic transactions
pub(crate) const DEFAULT_TX_ATTEMPTS: u32 = 5;

/// Base backoff between transaction retries, scaled by attempt number
const TX_RETRY_BASE_MS: u64 = 20;

/// Upper bound on the random jitter added to each retry backoff
const TX_RETRY_JITTER_MS: u64 = 25;

/// A stored document
///
/// `updated_at` is maintained by the store on every write and is distinct
/// from any timestamps the payload itself carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document key within its collection
    pub id: String,
    /// JSON payload
    pub data: Value,
    /// Last write timestamp (epoch ms), set by the store
    pub updated_at: i64,
}

impl Document {
    /// Decode the payload into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            Error::DeserializationError(format!("Document {} is malformed: {}", self.id, e))
        })
    }
}

/// The main database handle
///
/// Wraps a SQLite connection and exposes the document API that the rest
/// of the crate builds on: keyed reads and writes, structured queries,
/// atomic transactions, and live query watching.
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
    /// Registered live-query watchers
    watchers: Arc<WatchRegistry>,
    /// Retry budget for contended transactions
    max_tx_attempts: u32,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub async fn open(path: Option<&str>) -> Result<Self> {
        Self::open_with(super::StorageConfig {
            database_path: path.map(str::to_string),
            ..super::StorageConfig::default()
        })
        .await
    }

    /// Open or create a database with explicit configuration
    pub async fn open_with(config: super::StorageConfig) -> Result<Self> {
        let conn = match config.database_path.as_deref() {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            watchers: Arc::new(WatchRegistry::new()),
            max_tx_attempts: config.tx_max_attempts.max(1),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Check current schema version
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                // Fresh database, create all tables
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;

                // Set schema version
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!(
                    "Document store schema created (version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) => {
                tracing::debug!("Document store schema version: {}", v);
            }
        }

        Ok(())
    }

    /// Drop and recreate every table
    ///
    /// Removes all stored documents. Intended for sign-out data wipes and
    /// test isolation; live watchers are not notified.
    pub fn reset(&self) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute_batch(schema::DROP_TABLES)
                .map_err(|e| Error::DatabaseError(format!("Failed to drop tables: {}", e)))?;
        }
        self.init_schema()
    }

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    /// Read one document by key
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        fetch_document(&conn, collection, id)
    }

    /// Write one document, replacing any previous version
    pub async fn put_document(&self, collection: &str, id: &str, data: &Value) -> Result<()> {
        {
            let conn = self.conn.lock();
            store_document(&conn, collection, id, data)?;
        }
        self.publish(&[collection.to_string()]);
        Ok(())
    }

    /// Delete one document
    ///
    /// Returns whether a document was actually removed.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = {
            let conn = self.conn.lock();
            erase_document(&conn, collection, id)?
        };
        if removed {
            self.publish(&[collection.to_string()]);
        }
        Ok(removed)
    }

    /// Run a structured query
    pub async fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        fetch_query(&conn, query)
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Run a closure atomically against the store
    ///
    /// The closure may read, query, write, and delete through the
    /// [`Atomic`] view; all of it commits together. Returning an error
    /// rolls everything back and hands that error to the caller unchanged,
    /// so expected graph outcomes pass through without retry. Only SQLite
    /// lock contention is retried, with jittered backoff, up to the
    /// configured attempt budget.
    pub async fn run_atomic<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut Atomic<'_>) -> Result<T>,
    {
        enum Pass<T> {
            Done(T, Vec<String>),
            Aborted(Error),
            Sql(rusqlite::Error),
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // The connection lock is held for the whole attempt and released
            // before any backoff sleep.
            let pass = {
                let mut conn = self.conn.lock();
                // Bound locally so the scrutinee's borrow of the guard ends
                // before the guard drops with the block.
                let pass = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                    Err(e) => Pass::Sql(e),
                    Ok(tx) => {
                        let mut atomic = Atomic {
                            tx,
                            touched: Vec::new(),
                        };
                        match body(&mut atomic) {
                            Ok(value) => {
                                let (committed, touched) = atomic.commit();
                                match committed {
                                    Ok(()) => Pass::Done(value, touched),
                                    Err(e) => Pass::Sql(e),
                                }
                            }
                            // Dropping the transaction rolls it back
                            Err(e) => Pass::Aborted(e),
                        }
                    }
                };
                pass
            };

            match pass {
                Pass::Done(value, touched) => {
                    self.publish(&touched);
                    return Ok(value);
                }
                Pass::Aborted(e) => return Err(e),
                Pass::Sql(e) if is_busy(&e) && attempt < self.max_tx_attempts => {
                    let backoff = TX_RETRY_BASE_MS * u64::from(attempt)
                        + rand::thread_rng().gen_range(0..TX_RETRY_JITTER_MS);
                    tracing::debug!(
                        "Atomic transaction contended (attempt {}), retrying in {}ms",
                        attempt,
                        backoff
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Pass::Sql(e) if is_busy(&e) => {
                    return Err(Error::TransactionConflict(format!(
                        "gave up after {} attempts: {}",
                        attempt, e
                    )));
                }
                Pass::Sql(e) => {
                    return Err(Error::DatabaseError(format!("Transaction failed: {}", e)));
                }
            }
        }
    }

    // ========================================================================
    // WATCHING
    // ========================================================================

    /// Open a live view over a query
    ///
    /// The current result set is delivered as the first snapshot; a fresh
    /// snapshot follows every committed write that touches the queried
    /// collection.
    pub async fn watch_query(&self, query: Query) -> Result<Subscription> {
        // Register before the initial read so a write racing with
        // registration produces a redundant snapshot instead of a missed one.
        let (id, receiver) = self.watchers.register(query.clone());
        let initial = {
            let conn = self.conn.lock();
            fetch_query(&conn, &query)
        };
        match initial {
            Ok(documents) => self.watchers.push(id, documents),
            Err(e) => {
                self.watchers.deregister(id);
                return Err(e);
            }
        }
        Ok(Subscription::new(id, Arc::clone(&self.watchers), receiver))
    }

    /// Re-run affected watcher queries after a committed write
    fn publish(&self, collections: &[String]) {
        let mut touched = collections.to_vec();
        touched.sort();
        touched.dedup();

        for (id, query) in self.watchers.affected(&touched) {
            let snapshot = {
                let conn = self.conn.lock();
                fetch_query(&conn, &query)
            };
            match snapshot {
                Ok(documents) => self.watchers.push(id, documents),
                Err(e) => tracing::warn!("Failed to refresh watcher {}: {}", id, e),
            }
        }
    }
}

/// Transactional view over the store
///
/// Handed to [`Database::run_atomic`] closures. Reads see the
/// transaction's snapshot including its own writes; writes become visible
/// to the rest of the crate only at commit.
pub struct Atomic<'conn> {
    tx: rusqlite::Transaction<'conn>,
    touched: Vec<String>,
}

impl Atomic<'_> {
    /// Read one document by key
    pub fn read(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        fetch_document(&self.tx, collection, id)
    }

    /// Run a structured query
    pub fn query(&self, query: &Query) -> Result<Vec<Document>> {
        fetch_query(&self.tx, query)
    }

    /// Write one document, replacing any previous version
    pub fn write(&mut self, collection: &str, id: &str, data: &Value) -> Result<()> {
        store_document(&self.tx, collection, id, data)?;
        self.touched.push(collection.to_string());
        Ok(())
    }

    /// Delete one document
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<bool> {
        let removed = erase_document(&self.tx, collection, id)?;
        if removed {
            self.touched.push(collection.to_string());
        }
        Ok(removed)
    }

    fn commit(self) -> (rusqlite::Result<()>, Vec<String>) {
        let Atomic { tx, touched } = self;
        (tx.commit(), touched)
    }
}

// ============================================================================
// SHARED STATEMENT HELPERS
// ============================================================================
// Transactions deref to the connection, so the Database methods and the
// Atomic view share these.

fn fetch_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
    let result = conn.query_row(
        "SELECT id, data, updated_at FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        },
    );

    match result {
        Ok((id, raw, updated_at)) => Ok(Some(Document {
            data: parse_payload(&id, &raw)?,
            id,
            updated_at,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::DatabaseError(format!(
            "Failed to read document: {}",
            e
        ))),
    }
}

fn fetch_query(conn: &Connection, query: &Query) -> Result<Vec<Document>> {
    let (sql, params_vec) = query.to_sql();
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| Error::DatabaseError(format!("Failed to run query: {}", e)))?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, raw, updated_at) = row.map_err(|e| Error::DatabaseError(e.to_string()))?;
        documents.push(Document {
            data: parse_payload(&id, &raw)?,
            id,
            updated_at,
        });
    }
    Ok(documents)
}

fn store_document(conn: &Connection, collection: &str, id: &str, data: &Value) -> Result<()> {
    let now = crate::time::now_timestamp_millis();
    let payload = serde_json::to_string(data)?;
    conn.execute(
        "INSERT OR REPLACE INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)",
        params![collection, id, payload, now],
    )
    .map_err(|e| Error::DatabaseError(format!("Failed to write document: {}", e)))?;
    Ok(())
}

fn erase_document(conn: &Connection, collection: &str, id: &str) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to delete document: {}", e)))?;
    Ok(rows > 0)
}

fn parse_payload(id: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| {
        Error::DeserializationError(format!("Document {} payload is not valid JSON: {}", id, e))
    })
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

// ============================================================================
// TESTS
// ============================================================================
