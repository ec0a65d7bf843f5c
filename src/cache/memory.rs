//! In-process object cache.
//!
//! LRU bounded by entry count, each entry carrying its own expiry instant.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::backend::{CacheError, ObjectCache};
use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::memory";

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

pub struct MemoryCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[async_trait]
impl ObjectCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let lookup = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_many");
        for key in keys {
            entries.pop(key.as_str());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> MemoryCache {
        MemoryCache::new(&CacheConfig {
            memory_capacity: capacity,
            ..CacheConfig::default()
        })
    }

    #[tokio::test]
    async fn set_get_delete() {
        let cache = cache(8);
        cache
            .set("one_user_1", "{}".into(), Duration::from_secs(60))
            .await
            .expect("set");
        assert_eq!(cache.get("one_user_1").await.expect("get"), Some("{}".into()));

        cache.delete("one_user_1").await.expect("delete");
        assert_eq!(cache.get("one_user_1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let cache = cache(8);
        cache
            .set("k", "v".into(), Duration::ZERO)
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = cache(8);
        cache
            .set("k", "v".into(), Duration::from_millis(20))
            .await
            .expect("set");
        assert!(cache.get("k").await.expect("get").is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = cache(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1".into(), ttl).await.expect("set a");
        cache.set("b", "2".into(), ttl).await.expect("set b");
        cache.get("a").await.expect("touch a");
        cache.set("c", "3".into(), ttl).await.expect("set c");

        assert!(cache.get("a").await.expect("get a").is_some());
        assert!(cache.get("b").await.expect("get b").is_none());
        assert!(cache.get("c").await.expect("get c").is_some());
    }

    #[tokio::test]
    async fn delete_many_removes_all() {
        let cache = cache(8);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1".into(), ttl).await.expect("set a");
        cache.set("b", "2".into(), ttl).await.expect("set b");
        cache
            .delete_many(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .expect("delete_many");
        assert!(cache.is_empty());
    }
}
