//! Key-value store with per-entry TTL.
//!
//! The response cache and the rate limiter only need `get`, `set` with an
//! expiry and an atomic-ish `incr`. `MemoryStore` backs them with a moka
//! cache; a networked store can implement the same trait.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Increments the integer stored at `key` (missing counts as 0) and
    /// resets its expiry to `ttl`. Returns the new value.
    async fn incr(&self, key: &str, ttl: Duration) -> u64;
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct MemoryStore {
    entries: Cache<String, Entry>,
    incr_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
            incr_lock: Mutex::new(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries.insert(key.to_string(), Entry { value, ttl }).await;
    }

    async fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let _guard = self.incr_lock.lock().await;
        let current = self
            .entries
            .get(key)
            .await
            .and_then(|entry| entry.value.parse::<u64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        self.entries
            .insert(
                key.to_string(),
                Entry {
                    value: next.to_string(),
                    ttl,
                },
            )
            .await;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::default();
        store.set("search:rust", "{}".to_string(), Duration::from_secs(60)).await;
        assert_eq!(store.get("search:rust").await.as_deref(), Some("{}"));
        assert!(store.get("search:go").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::default();
        store.set("short", "v".to_string(), Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get("short").await.is_none());
    }

    #[tokio::test]
    async fn test_incr_counts_up() {
        let store = MemoryStore::default();
        assert_eq!(store.incr("hits", Duration::from_secs(60)).await, 1);
        assert_eq!(store.incr("hits", Duration::from_secs(60)).await, 2);
        assert_eq!(store.get("hits").await.as_deref(), Some("2"));
    }
}
