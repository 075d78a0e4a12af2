//! Permanent cache for resources that never change once published
//!
//! There is no expiry, eviction or invalidation: a key, once filled, holds
//! its first value for the life of the process. Concurrent misses on the same
//! key may both fetch; the first insert wins and the duplicate is dropped.
//! The lock is never held across an await.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub struct ImmutableCache<K, V> {
    name: &'static str,
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> ImmutableCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// `name` labels this cache's metrics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let hit = self.entries.read().get(key).cloned();
        let result = if hit.is_some() { "hit" } else { "miss" };
        metrics::counter!("immutable_cache_lookups_total", "cache" => self.name, "result" => result)
            .increment(1);
        hit
    }

    /// Insert unless the key is already present. Returns whichever value
    /// ends up stored.
    pub fn put(&self, key: K, value: V) -> Arc<V> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            debug!(cache = self.name, ?key, "key already cached, keeping first value");
            return existing.clone();
        }
        let value = Arc::new(value);
        entries.insert(key, value.clone());
        value
    }

    /// Serve from the cache, or run `fetch` and cache its success. A failed
    /// fetch caches nothing and its error goes to the caller.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        Ok(self.put(key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
