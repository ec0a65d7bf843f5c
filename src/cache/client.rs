//! Advisory access to the object cache.
//!
//! Every failure is logged and counted, then reported to the caller as a miss
//! or an unsuccessful write. No cache error ever reaches a reader.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::backend::{CacheError, ObjectCache};
use super::config::CacheConfig;

#[derive(Clone)]
pub struct CacheClient {
    backend: Arc<dyn ObjectCache>,
    config: Arc<CacheConfig>,
}

impl CacheClient {
    pub fn new(backend: Arc<dyn ObjectCache>, config: CacheConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    fn report(&self, op: &'static str, key: &str, err: &CacheError) {
        counter!("youyou_cache_errors_total", "op" => op, "kind" => err.kind()).increment(1);
        warn!(
            op,
            key,
            backend = self.backend.name(),
            error = %err,
            "Cache operation failed; continuing without cache"
        );
    }

    /// Look up and decode one key.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.config.is_enabled() {
            return None;
        }
        let full_key = self.config.namespaced(key);
        match self.backend.get(&full_key).await {
            Ok(Some(payload)) => self.decode(key, &full_key, &payload).await,
            Ok(None) => {
                counter!("youyou_cache_misses_total").increment(1);
                None
            }
            Err(err) => {
                self.report("get", key, &err);
                None
            }
        }
    }

    /// Look up and decode several keys; the result is aligned with `keys`.
    pub async fn get_many_json<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        if !self.config.is_enabled() || keys.is_empty() {
            return keys.iter().map(|_| None).collect();
        }
        let full_keys: Vec<String> = keys.iter().map(|key| self.config.namespaced(key)).collect();
        let payloads = match self.backend.get_many(&full_keys).await {
            Ok(payloads) => payloads,
            Err(err) => {
                self.report("get_many", &keys[0], &err);
                return keys.iter().map(|_| None).collect();
            }
        };

        let mut decoded = Vec::with_capacity(keys.len());
        for ((key, full_key), payload) in keys.iter().zip(&full_keys).zip(payloads) {
            let value = match payload {
                Some(payload) => self.decode(key, full_key, &payload).await,
                None => {
                    counter!("youyou_cache_misses_total").increment(1);
                    None
                }
            };
            decoded.push(value);
        }
        decoded
    }

    async fn decode<T: DeserializeOwned>(&self, key: &str, full_key: &str, payload: &str) -> Option<T> {
        match serde_json::from_str(payload) {
            Ok(value) => {
                counter!("youyou_cache_hits_total").increment(1);
                Some(value)
            }
            Err(err) => {
                counter!("youyou_cache_errors_total", "op" => "decode", "kind" => "payload")
                    .increment(1);
                warn!(key, error = %err, "Discarding undecodable cache payload");
                if let Err(err) = self.backend.delete(full_key).await {
                    self.report("delete", key, &err);
                }
                None
            }
        }
    }

    /// Encode and store a value. Returns whether the write reached the backend.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "Failed to encode cache payload");
                return false;
            }
        };
        match self
            .backend
            .set(&self.config.namespaced(key), payload, ttl)
            .await
        {
            Ok(()) => {
                debug!(key, ttl_secs = ttl.as_secs(), "Cache entry stored");
                true
            }
            Err(err) => {
                self.report("set", key, &err);
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        match self.backend.delete(&self.config.namespaced(key)).await {
            Ok(()) => {
                counter!("youyou_cache_evictions_total").increment(1);
                true
            }
            Err(err) => {
                self.report("delete", key, &err);
                false
            }
        }
    }

    pub async fn delete_many(&self, keys: &[String]) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        if keys.is_empty() {
            return true;
        }
        let full_keys: Vec<String> = keys.iter().map(|key| self.config.namespaced(key)).collect();
        match self.backend.delete_many(&full_keys).await {
            Ok(()) => {
                counter!("youyou_cache_evictions_total").increment(keys.len() as u64);
                true
            }
            Err(err) => {
                self.report("delete_many", &keys[0], &err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;

    fn client(config: CacheConfig) -> (Arc<MemoryCache>, CacheClient) {
        let backend = Arc::new(MemoryCache::new(&config));
        (backend.clone(), CacheClient::new(backend, config))
    }

    #[tokio::test]
    async fn round_trips_json_under_prefix() {
        let (backend, client) = client(CacheConfig {
            key_prefix: "yy".into(),
            ..CacheConfig::default()
        });
        assert!(client.set_json("one_user_1", &vec![1, 2, 3], Duration::from_secs(60)).await);

        let raw = backend.get("yy:one_user_1").await.expect("backend get");
        assert_eq!(raw.as_deref(), Some("[1,2,3]"));
        assert_eq!(client.get_json::<Vec<i64>>("one_user_1").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn undecodable_payload_is_evicted() {
        let (backend, client) = client(CacheConfig::default());
        backend
            .set("one_site_1", "not json".into(), Duration::from_secs(60))
            .await
            .expect("seed");

        assert_eq!(client.get_json::<Vec<i64>>("one_site_1").await, None);
        assert_eq!(backend.get("one_site_1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let (backend, client) = client(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        assert!(!client.set_json("k", &1, Duration::from_secs(60)).await);
        assert!(backend.is_empty());
        assert_eq!(client.get_json::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn get_many_aligns_with_keys() {
        let (_, client) = client(CacheConfig::default());
        client.set_json("b", &2, Duration::from_secs(60)).await;
        let keys = vec!["a".to_string(), "b".to_string()];
        assert_eq!(client.get_many_json::<i32>(&keys).await, vec![None, Some(2)]);
    }
}
