use sqlx::migrate::MigrateError;
use thiserror::Error;

use crate::cache::CacheError;

/// Failures while wiring up the process: pools, schema, cache backend, logging.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database unreachable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] MigrateError),
    #[error("cache backend rejected setup: {0}")]
    Cache(#[from] CacheError),
    #[error("tracing subscriber not installed: {0}")]
    Telemetry(String),
    #[error("missing setting `{setting}`")]
    MissingSetting { setting: &'static str },
}

impl InfraError {
    pub fn missing(setting: &'static str) -> Self {
        Self::MissingSetting { setting }
    }
}
