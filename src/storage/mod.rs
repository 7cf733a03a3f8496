//! # Storage Module
//!
//! Transactional document store for Kith data.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  Document API                                                   │    │
//! │  │  ────────────                                                   │    │
//! │  │                                                                 │    │
//! │  │  Collections are path strings; documents are JSON payloads      │    │
//! │  │  addressed by (collection, id):                                 │    │
//! │  │                                                                 │    │
//! │  │  • friendRequests                  - request lifecycle records  │    │
//! │  │  • users/<uid>/friends             - one edge per friendship    │    │
//! │  │  • users/<uid>/blocks              - block state per target     │    │
//! │  │  • users/<uid>/blocks/<t>/events   - append-only block audit    │    │
//! │  │  • friendCooldowns                 - re-request suppressions    │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  Access Paths                                                   │    │
//! │  │  ────────────                                                   │    │
//! │  │                                                                 │    │
//! │  │  get/put/delete  - keyed single-document access                 │    │
//! │  │  run_query       - Query: filters + ordering + cursor + limit   │    │
//! │  │  run_atomic      - multi-document transactions with retry       │    │
//! │  │  watch_query     - snapshot stream per committed write          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod database;
mod query;
mod schema;
mod watch;

pub use database::{Atomic, Database, Document};
pub use query::{Filter, Query, SortDirection};
pub use watch::Subscription;

use crate::error::Result;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database file (None for in-memory)
    pub database_path: Option<String>,
    /// Retry budget for contended atomic transactions
    pub tx_max_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            tx_max_attempts: database::DEFAULT_TX_ATTEMPTS,
        }
    }
}

/// Initialize the storage system
pub async fn init(config: StorageConfig) -> Result<Database> {
    Database::open_with(config).await
}
