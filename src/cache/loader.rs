//! Read-through snapshot loader.
//!
//! Serves batches of entity snapshots from the object cache, filling misses
//! with one batched store fetch per call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, instrument, warn};

use crate::application::repos::{EntityStore, RepoError};
use crate::domain::snapshots::{
    ArticleSnapshot, CommentSnapshot, ReviewSnapshot, ShareSnapshot, SiteSnapshot, Snapshot,
    UserSnapshot,
};
use crate::domain::types::EntityKind;

use super::client::CacheClient;
use super::keys::SnapshotKey;

/// A snapshot whose records can be fetched in batches from the store.
pub trait StoredSnapshot: Snapshot {
    fn fetch<'a>(
        store: &'a dyn EntityStore,
        ids: &'a [i64],
    ) -> BoxFuture<'a, Result<Vec<Self::Record>, RepoError>>;
}

macro_rules! stored_snapshot {
    ($snapshot:ty, $method:ident) => {
        impl StoredSnapshot for $snapshot {
            fn fetch<'a>(
                store: &'a dyn EntityStore,
                ids: &'a [i64],
            ) -> BoxFuture<'a, Result<Vec<Self::Record>, RepoError>> {
                store.$method(ids)
            }
        }
    };
}

stored_snapshot!(UserSnapshot, fetch_users);
stored_snapshot!(SiteSnapshot, fetch_sites);
stored_snapshot!(ReviewSnapshot, fetch_reviews);
stored_snapshot!(CommentSnapshot, fetch_comments);
stored_snapshot!(ArticleSnapshot, fetch_articles);
stored_snapshot!(ShareSnapshot, fetch_shares);

fn snapshot_key<S: Snapshot>(id: i64) -> String {
    SnapshotKey::new(S::KIND, id).to_string()
}

fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Clone)]
pub struct SnapshotLoader {
    store: Arc<dyn EntityStore>,
    cache: CacheClient,
}

impl SnapshotLoader {
    pub fn new(store: Arc<dyn EntityStore>, cache: CacheClient) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    /// One snapshot per input id, in input order. Missing ids are omitted, as
    /// are invalid entities when `valid_only` is set.
    #[instrument(skip(self, ids), fields(kind = %S::KIND, requested = ids.len()))]
    pub async fn load<S: StoredSnapshot>(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<S>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let unique = distinct(ids);
        let keys: Vec<String> = unique.iter().map(|id| snapshot_key::<S>(*id)).collect();
        let cached = self.cache.get_many_json::<S>(&keys).await;

        let mut found: HashMap<i64, S> = HashMap::with_capacity(unique.len());
        let mut misses = Vec::new();
        for (id, snapshot) in unique.iter().zip(cached) {
            match snapshot {
                Some(snapshot) if snapshot.id() == *id => {
                    found.insert(*id, snapshot);
                }
                _ => misses.push(*id),
            }
        }

        let hits = found.len();
        if !misses.is_empty() {
            let records = S::fetch(self.store.as_ref(), &misses).await?;
            let ttl = self.cache.ttl();
            for record in &records {
                let snapshot = S::format(record);
                self.cache
                    .set_json(&snapshot_key::<S>(snapshot.id()), &snapshot, ttl)
                    .await;
                found.insert(snapshot.id(), snapshot);
            }
        }
        debug!(hits, misses = misses.len(), "Snapshots loaded");

        Ok(ids
            .iter()
            .filter_map(|id| found.get(id))
            .filter(|snapshot| !valid_only || snapshot.is_valid())
            .cloned()
            .collect())
    }

    /// Format a freshly committed record and write its snapshot.
    ///
    /// A failed write is followed by a delete so the previous snapshot cannot
    /// outlive the commit.
    pub async fn update_cache<S: Snapshot>(&self, record: &S::Record) -> S {
        let snapshot = S::format(record);
        let key = snapshot_key::<S>(snapshot.id());
        let stored = self
            .cache
            .set_json(&key, &snapshot, self.cache.ttl())
            .await;
        if !stored && self.cache.config().is_enabled() && !self.cache.delete(&key).await {
            warn!(
                key = key.as_str(),
                "Snapshot refresh and eviction both failed; entry may be stale until expiry"
            );
        }
        snapshot
    }

    /// Re-read entities from the store and overwrite their snapshots.
    pub async fn refresh<S: StoredSnapshot>(&self, ids: &[i64]) -> Result<Vec<S>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = S::fetch(self.store.as_ref(), &distinct(ids)).await?;
        let mut snapshots = Vec::with_capacity(records.len());
        for record in &records {
            snapshots.push(self.update_cache::<S>(record).await);
        }
        Ok(snapshots)
    }

    pub async fn evict_kind(&self, kind: EntityKind, ids: &[i64]) -> bool {
        let keys: Vec<String> = distinct(ids)
            .into_iter()
            .map(|id| SnapshotKey::new(kind, id).to_string())
            .collect();
        self.cache.delete_many(&keys).await
    }

    pub async fn users(&self, ids: &[i64], valid_only: bool) -> Result<Vec<UserSnapshot>, RepoError> {
        self.load(ids, valid_only).await
    }

    pub async fn sites(&self, ids: &[i64], valid_only: bool) -> Result<Vec<SiteSnapshot>, RepoError> {
        self.load(ids, valid_only).await
    }

    pub async fn reviews(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<ReviewSnapshot>, RepoError> {
        self.load(ids, valid_only).await
    }

    pub async fn comments(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<CommentSnapshot>, RepoError> {
        self.load(ids, valid_only).await
    }

    pub async fn articles(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<ArticleSnapshot>, RepoError> {
        self.load(ids, valid_only).await
    }

    pub async fn shares(&self, ids: &[i64]) -> Result<Vec<ShareSnapshot>, RepoError> {
        self.load(ids, false).await
    }
}
