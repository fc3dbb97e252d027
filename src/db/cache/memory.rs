use moka::{sync::Cache, Expiry};
use std::time::{Duration, Instant};

use super::ResponseCache;
use crate::error::AppResult;

/// Cached JSON plus the TTL it was written with
#[derive(Clone)]
struct Entry {
    json: String,
    ttl: Duration,
}

/// Expires each entry `ttl` after its latest write
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process response cache on moka
pub struct MemoryCache {
    inner: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait::async_trait]
impl ResponseCache for MemoryCache {
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.inner.get(key).map(|entry| entry.json))
    }

    fn set_raw(&self, key: String, value: String, ttl: u64) {
        let entry = Entry {
            json: value,
            ttl: Duration::from_secs(ttl),
        };
        self.inner.insert(key, entry);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::default();
        cache.set_raw("short".to_string(), "\"v\"".to_string(), 1);
        cache.set_raw("long".to_string(), "\"w\"".to_string(), 300);
        assert_eq!(cache.get_raw("short").await.unwrap().as_deref(), Some("\"v\""));

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(cache.get_raw("short").await.unwrap(), None);
        assert_eq!(cache.get_raw("long").await.unwrap().as_deref(), Some("\"w\""));
        // Expired entries are evicted without being read again
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let cache = MemoryCache::default();
        cache.set_raw("k".to_string(), "1".to_string(), 1);
        cache.set_raw("k".to_string(), "2".to_string(), 60);

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(cache.get_raw("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_miss() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get_raw("absent").await.unwrap(), None);
    }
}
