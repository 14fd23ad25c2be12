//! Read-through TTL cache used in front of the configuration, partnership
//! and preference stores.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> core::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TtlCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`. An expired entry is evicted on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(e) if e.expires_at > now => return Some(e.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        if let Ok(mut entries) = self.entries.write() {
            // another writer may have refreshed it since the read
            if entries.get(key).is_some_and(|e| e.expires_at <= now) {
                entries.remove(key);
            }
        }
        None
    }

    /// Stores `value` and sweeps out every expired entry, so keys that are
    /// never read again do not accumulate.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| e.expires_at > now);
            entries.insert(key, Entry { value, expires_at });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached value, or `load` on a miss. Errors are not cached.
    pub fn get_or_try_insert<E>(&self, key: &K, load: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = load()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
