//! Versioned response cache.
//!
//! This module defines the cache store capability used by the worker and
//! two backends for it:
//!
//! - `CacheDb`: persistent SQLite storage with async access via tokio-rusqlite
//!   (WAL mode, automatic schema migrations)
//! - `MemoryCacheStore`: process-local maps, used in tests and for
//!   ephemeral workers
//!
//! Entries are grouped into named generations and addressed by a SHA-256
//! key over the request method and canonical URL.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryCacheStore;
pub use store::{CacheStore, CachedEntry, Generation};
