//! # Database Schema
//!
//! SQL schema definitions for the Kith document store.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────┐         ┌─────────────────┐               │
//! │  │        documents         │         │ schema_version  │               │
//! │  ├──────────────────────────┤         ├─────────────────┤               │
//! │  │ collection  (path)       │         │ version         │               │
//! │  │ id          (doc key)    │         └─────────────────┘               │
//! │  │ data        (JSON)       │                                           │
//! │  │ updated_at  (epoch ms)   │                                           │
//! │  └──────────────────────────┘                                           │
//! │                                                                         │
//! │  One row per document. The collection column carries the full           │
//! │  path ("friendRequests", "users/<uid>/friends", ...), so nested         │
//! │  collections need no extra tables. Field filters and ordering are       │
//! │  evaluated with json_extract over the data column.                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Documents table
-- One row per document across every collection
CREATE TABLE IF NOT EXISTS documents (
    -- Full collection path, e.g. 'users/abc/friends'
    collection TEXT NOT NULL,
    -- Document key within the collection
    id TEXT NOT NULL,
    -- JSON payload
    data TEXT NOT NULL,
    -- Last write timestamp (Unix timestamp ms)
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, updated_at DESC);
"#;

/// SQL to drop all tables (for testing/reset)
pub const DROP_TABLES: &str = r#"
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS schema_version;
"#;
