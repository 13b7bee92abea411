//! In-memory cache store.
//!
//! Backs the worker when no persistence is wanted and drives the worker
//! tests. Entries are shared behind `Arc` and swapped whole, so readers
//! never see a half-written entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CacheStore, CachedEntry, Generation};
use crate::Error;

struct Slot {
    created_at: String,
    seq: u64,
    entries: HashMap<String, Arc<CachedEntry>>,
}

#[derive(Default)]
struct Inner {
    generations: HashMap<String, Slot>,
    next_seq: u64,
}

impl Inner {
    fn slot(&mut self, name: &str) -> &mut Slot {
        let seq = self.next_seq;
        let slot = self.generations.entry(name.to_string()).or_insert_with(|| Slot {
            created_at: chrono::Utc::now().to_rfc3339(),
            seq,
            entries: HashMap::new(),
        });
        if slot.seq == seq {
            self.next_seq += 1;
        }
        slot
    }
}

/// Process-local cache store.
///
/// Clones share the same underlying maps.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<Inner>>,
    operations: Arc<AtomicUsize>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations performed so far.
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of entries currently held in a generation.
    pub async fn len(&self, name: &str) -> usize {
        self.inner
            .read()
            .await
            .generations
            .get(name)
            .map(|slot| slot.entries.len())
            .unwrap_or(0)
    }

    fn record(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<Generation, Error> {
        self.record();
        let mut inner = self.inner.write().await;
        let slot = inner.slot(name);
        Ok(Generation { name: name.to_string(), created_at: slot.created_at.clone() })
    }

    async fn put(&self, generation: &Generation, entry: CachedEntry) -> Result<(), Error> {
        self.record();
        let mut inner = self.inner.write().await;
        inner
            .slot(&generation.name)
            .entries
            .insert(entry.key.clone(), Arc::new(entry));
        Ok(())
    }

    async fn commit(&self, name: &str, entries: Vec<CachedEntry>) -> Result<Generation, Error> {
        self.record();
        let mut inner = self.inner.write().await;
        let slot = inner.slot(name);
        for entry in entries {
            slot.entries.insert(entry.key.clone(), Arc::new(entry));
        }
        Ok(Generation { name: name.to_string(), created_at: slot.created_at.clone() })
    }

    async fn lookup(&self, key: &str, scope: Option<&str>) -> Result<Option<CachedEntry>, Error> {
        self.record();
        let inner = self.inner.read().await;
        let found = match scope {
            Some(name) => inner.generations.get(name).and_then(|slot| slot.entries.get(key)),
            None => inner
                .generations
                .values()
                .filter_map(|slot| slot.entries.get(key).map(|entry| (slot.seq, entry)))
                .max_by_key(|(seq, entry)| (entry.stored_at, *seq))
                .map(|(_, entry)| entry),
        };
        Ok(found.map(|entry| entry.as_ref().clone()))
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.record();
        let inner = self.inner.read().await;
        let mut slots: Vec<(&String, u64)> = inner.generations.iter().map(|(name, slot)| (name, slot.seq)).collect();
        slots.sort_by_key(|(_, seq)| *seq);
        Ok(slots.into_iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        self.record();
        Ok(self.inner.write().await.generations.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_request_key;

    fn make_entry(url: &str, body: &str, stored_at: i64) -> CachedEntry {
        CachedEntry {
            key: compute_request_key("GET", url),
            url: url.to_string(),
            method: "GET".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            stored_at,
        }
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let store = MemoryCacheStore::new();
        let generation = store.open("v1").await.unwrap();
        let entry = make_entry("https://example.com/", "home", 1);
        store.put(&generation, entry.clone()).await.unwrap();

        assert_eq!(store.lookup(&entry.key, Some("v1")).await.unwrap(), Some(entry.clone()));
        assert_eq!(store.lookup(&entry.key, Some("v2")).await.unwrap(), None);
        assert_eq!(store.len("v1").await, 1);
    }

    #[tokio::test]
    async fn test_unscoped_lookup_returns_newest() {
        let store = MemoryCacheStore::new();
        let old = store.open("v1").await.unwrap();
        let new = store.open("v2").await.unwrap();
        store.put(&new, make_entry("https://example.com/", "v2", 5)).await.unwrap();
        store.put(&old, make_entry("https://example.com/", "v1", 9)).await.unwrap();

        let key = compute_request_key("GET", "https://example.com/");
        let found = store.lookup(&key, None).await.unwrap().unwrap();
        assert_eq!(found.body, b"v1");
    }

    #[tokio::test]
    async fn test_generations_order_and_delete() {
        let store = MemoryCacheStore::new();
        store.open("b").await.unwrap();
        store.open("a").await.unwrap();
        store.open("b").await.unwrap();
        assert_eq!(store.generations().await.unwrap(), vec!["b", "a"]);

        assert!(store.delete_generation("b").await.unwrap());
        assert!(!store.delete_generation("b").await.unwrap());
        assert_eq!(store.generations().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_operations_counted() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.operations(), 0);
        store.open("v1").await.unwrap();
        store.lookup("missing", None).await.unwrap();
        assert_eq!(store.operations(), 2);
    }
}
