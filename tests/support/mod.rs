#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use youyou::application::context::AppContext;
use youyou::cache::{CacheConfig, CacheError, MemoryCache, ObjectCache};
use youyou::domain::entities::ReviewDraft;
use youyou::infra::memory::MemoryStore;

/// Cache backend whose every operation fails, standing in for a dead redis.
pub struct UnreachableCache;

#[async_trait]
impl ObjectCache for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

pub struct World {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub app: AppContext,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new(&config));
        let app = AppContext::new(store.clone(), cache.clone(), config);
        Self { store, cache, app }
    }

    /// Same store, but every cache call fails.
    pub fn unreachable_cache() -> Self {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new(&config));
        let app = AppContext::new(store.clone(), Arc::new(UnreachableCache), config);
        Self { store, cache, app }
    }
}

pub fn review(user_id: i64, site_id: i64, stars: f64) -> ReviewDraft {
    ReviewDraft {
        user_id,
        site_id: Some(site_id),
        stars: Some(stars),
        content: format!("{stars} stars"),
        published: true,
        ..ReviewDraft::default()
    }
}

pub fn hours_ago(hours: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() - time::Duration::hours(hours)
}
