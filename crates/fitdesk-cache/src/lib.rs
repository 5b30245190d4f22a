//! Group-scoped read-through cache. Managers each own a cache group;
//! invalidating one group can never touch another's entries.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Pluggable backing store keyed by `(group, key)`. Values are JSON so
/// one store serves heterogeneous managers.
pub trait CacheStore: Send + Sync {
    fn get(&self, group: &str, key: &str) -> Option<Value>;
    fn set(&self, group: &str, key: &str, value: Value, ttl: Duration);
    fn delete(&self, group: &str, key: &str);
    fn delete_group(&self, group: &str);
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process store. Expired entries are dropped lazily on read and
/// swept opportunistically on write.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Entry>> {
        // A poisoned cache is stale data at worst, so recover the guard.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, group: &str, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        let k = (group.to_string(), key.to_string());
        match entries.get(&k) {
            Some(e) if e.expires_at > Instant::now() => Some(e.value.clone()),
            Some(_) => {
                entries.remove(&k);
                None
            }
            None => None,
        }
    }

    fn set(&self, group: &str, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            (group.to_string(), key.to_string()),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn delete(&self, group: &str, key: &str) {
        self.lock().remove(&(group.to_string(), key.to_string()));
    }

    fn delete_group(&self, group: &str) {
        self.lock().retain(|(g, _), _| g != group);
    }
}

/// The facade handed to data managers: read-through get-or-compute
/// plus single-key and whole-group invalidation.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Return the cached value under `(group, key)` if present and
    /// unexpired; otherwise run `generator`, store its result with
    /// `ttl`, and return it. Generator errors are returned as-is and
    /// never cached.
    pub fn get_or_compute<T, E, F>(
        &self,
        group: &str,
        key: &str,
        ttl: Duration,
        generator: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(raw) = self.store.get(group, key) {
            match serde_json::from_value::<T>(raw) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    // Shape drift between releases; treat as a miss.
                    debug!(group, key, "discarding undecodable cache entry: {e}");
                    self.store.delete(group, key);
                }
            }
        }

        let fresh = generator()?;
        match serde_json::to_value(&fresh) {
            Ok(raw) => self.store.set(group, key, raw, ttl),
            Err(e) => debug!(group, key, "value not cacheable: {e}"),
        }
        Ok(fresh)
    }

    pub fn invalidate(&self, group: &str, key: &str) {
        self.store.delete(group, key);
    }

    pub fn invalidate_group(&self, group: &str) {
        self.store.delete_group(group);
    }
}
