//! Named cache stores backed by SQLite.
//!
//! Mirrors the host's cache storage model: any number of named stores, each
//! mapping a request identity (method + URL) to a stored response.
//!
//! - Request identities hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Stores deleted wholesale (entries cascade)

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheSummary, StoredEntry};
pub use storage::{CacheHandle, CacheStorage};
