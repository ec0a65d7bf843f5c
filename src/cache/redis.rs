//! Redis-backed object cache.
//!
//! Connects lazily so the process can start while Redis is down; every call
//! made before the server becomes reachable fails with `Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::debug;

use super::backend::{CacheError, ObjectCache};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

pub struct RedisCache {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    op_timeout: Duration,
}

impl RedisCache {
    /// Parse the URL without connecting.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|err| CacheError::Protocol(err.to_string()))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!(target = "youyou::cache::redis", "Opening redis connection manager");
                self.bounded(ConnectionManager::new(self.client.clone()))
                    .await
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(map_redis_error),
            Err(_) => Err(CacheError::Timeout),
        }
    }
}

fn map_redis_error(err: RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::unavailable(err)
    } else {
        CacheError::Protocol(err.to_string())
    }
}

/// `SETEX` rejects a zero expiry.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ObjectCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl)))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.del::<_, ()>(key)).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let values: Vec<Option<String>> = self
            .bounded(redis::cmd("MGET").arg(keys).query_async(&mut conn))
            .await?;
        if values.len() != keys.len() {
            return Err(CacheError::Protocol(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        self.bounded(conn.del::<_, ()>(keys)).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_at_least_one_second() {
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(900)), 900);
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(
            RedisCache::new("not a url"),
            Err(CacheError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_error() {
        let cache = RedisCache::new("redis://127.0.0.1:1/")
            .expect("valid url")
            .with_op_timeout(Duration::from_millis(200));
        assert!(cache.get("one_user_1").await.is_err());
    }

    #[tokio::test]
    async fn batched_reads_short_circuit_or_report_outage() {
        let cache = RedisCache::new("redis://127.0.0.1:1/")
            .expect("valid url")
            .with_op_timeout(Duration::from_millis(200));
        assert_eq!(cache.get_many(&[]).await.expect("no keys"), Vec::<Option<String>>::new());

        let keys = vec!["one_user_1".to_string(), "one_user_2".to_string()];
        assert!(cache.get_many(&keys).await.is_err());
    }
}
