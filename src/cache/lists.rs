//! Id-list query cache.
//!
//! Stores only the ordered ids a composite query produced; entities are
//! materialized separately through the snapshot loader.

use std::sync::Arc;

use tracing::debug;

use crate::application::repos::{EntityStore, RepoError};

use super::client::CacheClient;
use super::keys::ListQuery;

#[derive(Clone)]
pub struct IdListCache {
    store: Arc<dyn EntityStore>,
    cache: CacheClient,
}

impl IdListCache {
    pub fn new(store: Arc<dyn EntityStore>, cache: CacheClient) -> Self {
        Self { store, cache }
    }

    pub async fn ids(&self, query: &ListQuery) -> Result<Vec<i64>, RepoError> {
        let key = query.cache_key();
        if let Some(ids) = self.cache.get_json::<Vec<i64>>(&key).await {
            debug!(key = key.as_str(), count = ids.len(), "Id list served from cache");
            return Ok(ids);
        }

        let ids = self.store.list_ids(query).await?;
        self.cache
            .set_json(&key, &ids, self.cache.ttl())
            .await;
        debug!(key = key.as_str(), count = ids.len(), "Id list filled from store");
        Ok(ids)
    }

    pub async fn evict(&self, queries: &[ListQuery]) -> bool {
        let keys: Vec<String> = queries.iter().map(ListQuery::cache_key).collect();
        self.cache.delete_many(&keys).await
    }
}
