//! Cache trigger service.
//!
//! Receives committed changes from the write path and brings derived state
//! up to date: counters first, then id-list invalidation. Both phases run
//! before the write call returns.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::application::repos::RepoError;

use super::config::CacheConfig;
use super::counters::{CounterMaintainer, Recount, RecountReport};
use super::events::{ChangeEvent, ChangeKind, EventClock};
use super::invalidator::Invalidator;
use super::planner::InvalidationPlan;

/// What one trigger call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub recount: RecountReport,
    pub evicted_lists: usize,
}

pub struct CacheTrigger {
    config: CacheConfig,
    clock: EventClock,
    counters: CounterMaintainer,
    invalidator: Invalidator,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, counters: CounterMaintainer, invalidator: Invalidator) -> Self {
        Self {
            config,
            clock: EventClock::new(),
            counters,
            invalidator,
        }
    }

    pub async fn changed(&self, kind: ChangeKind) -> Result<TriggerOutcome, RepoError> {
        self.changed_all(vec![kind]).await
    }

    /// Stamp the changes, recompute affected counters, then evict lists.
    ///
    /// Counters are store writes and run even with the cache disabled;
    /// evictions are skipped in that case.
    pub async fn changed_all(&self, kinds: Vec<ChangeKind>) -> Result<TriggerOutcome, RepoError> {
        let events: Vec<ChangeEvent> = kinds.into_iter().map(|kind| self.clock.stamp(kind)).collect();

        let recounts: BTreeSet<Recount> = events
            .iter()
            .flat_map(|event| Recount::for_change(&event.kind))
            .collect();
        info!(events = events.len(), counters = recounts.len(), "Cache trigger: counter phase");
        let recount = self.counters.recount(&recounts).await?;

        if !self.config.is_enabled() {
            debug!(events = events.len(), "Cache trigger: invalidation skipped, cache disabled");
            return Ok(TriggerOutcome {
                recount,
                evicted_lists: 0,
            });
        }

        let plan = InvalidationPlan::from_events(events);
        info!(plan = %plan, "Cache trigger: invalidation phase");
        self.invalidator.execute(&plan).await;

        Ok(TriggerOutcome {
            recount,
            evicted_lists: plan.lists.len(),
        })
    }

    pub async fn follow_changed(&self, followed_id: i64, fan_id: i64) -> Result<TriggerOutcome, RepoError> {
        self.changed(ChangeKind::FollowChanged {
            followed_id,
            fan_id,
        })
        .await
    }

    pub async fn like_changed(&self, user_id: i64, review_id: i64) -> Result<TriggerOutcome, RepoError> {
        self.changed(ChangeKind::LikeChanged { user_id, review_id })
            .await
    }

    pub async fn favorite_changed(&self, user_id: i64, site_id: i64) -> Result<TriggerOutcome, RepoError> {
        self.changed(ChangeKind::FavoriteChanged { user_id, site_id })
            .await
    }
}
