//! Executes invalidation plans against the object cache.

use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};

use super::keys::ListQuery;
use super::lists::IdListCache;
use super::planner::InvalidationPlan;

pub struct Invalidator {
    lists: IdListCache,
}

impl Invalidator {
    pub fn new(lists: IdListCache) -> Self {
        Self { lists }
    }

    /// Evict every list in the plan. Returns whether the backend accepted the batch.
    #[instrument(skip(self, plan), fields(lists = plan.lists.len()))]
    pub async fn execute(&self, plan: &InvalidationPlan) -> bool {
        if plan.is_empty() {
            return true;
        }
        let started = Instant::now();
        let queries: Vec<ListQuery> = plan.lists.iter().copied().collect();
        let evicted = self.lists.evict(&queries).await;
        histogram!("youyou_cache_invalidation_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            lists = plan.lists.len(),
            events = plan.events,
            evicted,
            "Id lists invalidated"
        );
        evicted
    }
}
