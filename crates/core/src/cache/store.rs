//! The cache store capability.
//!
//! A store holds named generations, each mapping request keys to response
//! snapshots. Implementations must be safe to share across concurrently
//! running request handlers: writes to one key are last-write-wins and a
//! reader never observes a partially written entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A snapshot of a response stored under a request key.
///
/// Entries are immutable once written; re-writing a key replaces the
/// whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Write time in microseconds since the Unix epoch.
    pub stored_at: i64,
}

impl CachedEntry {
    /// Value of the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Handle to an open generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub created_at: String,
}

/// Storage capability for versioned response caches.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it if it does not exist yet.
    async fn open(&self, name: &str) -> Result<Generation, Error>;

    /// Store an entry in a generation, replacing any entry with the same key.
    async fn put(&self, generation: &Generation, entry: CachedEntry) -> Result<(), Error>;

    /// Create (or extend) a generation and store every entry in one step.
    ///
    /// Either all entries become visible or none do.
    async fn commit(&self, name: &str, entries: Vec<CachedEntry>) -> Result<Generation, Error>;

    /// Find the newest entry for `key`, within `scope` if given or across all
    /// generations otherwise.
    async fn lookup(&self, key: &str, scope: Option<&str>) -> Result<Option<CachedEntry>, Error>;

    /// Names of all generations, oldest first.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    async fn delete_generation(&self, name: &str) -> Result<bool, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_case_insensitive() {
        let entry = CachedEntry {
            key: "k".into(),
            url: "https://example.com/".into(),
            method: "GET".into(),
            status: 200,
            status_text: "OK".into(),
            headers: vec![("Content-Type".into(), "text/html".into())],
            body: Vec::new(),
            stored_at: 0,
        };
        assert_eq!(entry.header("content-type"), Some("text/html"));
        assert_eq!(entry.header("etag"), None);
    }
}
