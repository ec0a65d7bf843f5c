//! Denormalized counter maintenance.
//!
//! Counters are always recomputed from their child relation and written
//! whole; nothing is incremented. Concurrent recounts of the same counter are
//! last-write-wins and converge on the next recount.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument};

use crate::application::repos::{
    CounterWrite, EntityStore, RepoError, ReviewCounter, SiteImageSources, SiteReviewStats,
    UserCounter,
};
use crate::domain::snapshots::{
    ArticleSnapshot, CommentSnapshot, EntitySnapshot, ReviewSnapshot, ShareSnapshot,
    SiteSnapshot, UserSnapshot,
};
use crate::domain::types::{EntityKind, EntityRef};

use super::events::ChangeKind;
use super::keys::CommentScope;
use super::loader::{SnapshotLoader, StoredSnapshot};

/// One counter on one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Recount {
    /// `review_num` and `stars` together.
    SiteReviews(i64),
    SiteImages(i64),
    UserReviews(i64),
    UserFans(i64),
    UserFollows(i64),
    UserLikes(i64),
    UserFavorites(i64),
    UserShares(i64),
    ReviewLikes(i64),
    ReviewComments(i64),
    ArticleComments(i64),
}

impl fmt::Display for Recount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target();
        write!(f, "{}:{}", self.label(), target)
    }
}

impl Recount {
    pub fn label(&self) -> &'static str {
        match self {
            Recount::SiteReviews(_) => "site_reviews",
            Recount::SiteImages(_) => "site_images",
            Recount::UserReviews(_) => "user_reviews",
            Recount::UserFans(_) => "user_fans",
            Recount::UserFollows(_) => "user_follows",
            Recount::UserLikes(_) => "user_likes",
            Recount::UserFavorites(_) => "user_favorites",
            Recount::UserShares(_) => "user_shares",
            Recount::ReviewLikes(_) => "review_likes",
            Recount::ReviewComments(_) => "review_comments",
            Recount::ArticleComments(_) => "article_comments",
        }
    }

    /// Entity whose snapshot carries the counter.
    pub fn target(&self) -> EntityRef {
        match *self {
            Recount::SiteReviews(id) | Recount::SiteImages(id) => EntityRef::site(id),
            Recount::UserReviews(id)
            | Recount::UserFans(id)
            | Recount::UserFollows(id)
            | Recount::UserLikes(id)
            | Recount::UserFavorites(id)
            | Recount::UserShares(id) => EntityRef::user(id),
            Recount::ReviewLikes(id) | Recount::ReviewComments(id) => EntityRef::review(id),
            Recount::ArticleComments(id) => EntityRef::article(id),
        }
    }

    /// Counters that a committed change may have moved.
    pub fn for_change(kind: &ChangeKind) -> BTreeSet<Recount> {
        let mut out = BTreeSet::new();
        match kind {
            ChangeKind::ReviewWritten {
                before,
                after,
                likers,
                membership_changed,
                ..
            } => {
                for facets in before.iter().chain(after.iter()) {
                    if let Some(site_id) = facets.site_id {
                        out.insert(Recount::SiteReviews(site_id));
                        out.insert(Recount::SiteImages(site_id));
                    }
                    if let Some(user_id) = facets.user_id {
                        out.insert(Recount::UserReviews(user_id));
                    }
                }
                if *membership_changed {
                    out.extend(likers.iter().map(|liker| Recount::UserLikes(*liker)));
                }
            }
            ChangeKind::CommentWritten { before, after, .. } => {
                for facets in before.iter().chain(after.iter()) {
                    if let Some(review_id) = facets.review_id {
                        out.insert(Recount::ReviewComments(review_id));
                    }
                    if let Some(article_id) = facets.article_id {
                        out.insert(Recount::ArticleComments(article_id));
                    }
                }
            }
            ChangeKind::FollowChanged {
                followed_id,
                fan_id,
            } => {
                out.insert(Recount::UserFans(*followed_id));
                out.insert(Recount::UserFollows(*fan_id));
            }
            ChangeKind::LikeChanged { user_id, review_id } => {
                out.insert(Recount::ReviewLikes(*review_id));
                out.insert(Recount::UserLikes(*user_id));
            }
            ChangeKind::FavoriteChanged { user_id, .. } => {
                out.insert(Recount::UserFavorites(*user_id));
            }
            ChangeKind::ShareRecorded { user_id, .. } => {
                out.insert(Recount::UserShares(*user_id));
            }
            ChangeKind::SiteImagesChanged { site_id } => {
                out.insert(Recount::SiteImages(*site_id));
            }
            ChangeKind::UserUpdated { .. } => {}
        }
        out
    }

    /// Every counter an entity carries.
    pub fn all_for(entity: EntityRef) -> Vec<Recount> {
        let id = entity.id;
        match entity.kind {
            EntityKind::Site => vec![Recount::SiteReviews(id), Recount::SiteImages(id)],
            EntityKind::User => vec![
                Recount::UserReviews(id),
                Recount::UserFans(id),
                Recount::UserFollows(id),
                Recount::UserLikes(id),
                Recount::UserFavorites(id),
                Recount::UserShares(id),
            ],
            EntityKind::Review => vec![Recount::ReviewLikes(id), Recount::ReviewComments(id)],
            EntityKind::Article => vec![Recount::ArticleComments(id)],
            EntityKind::Comment | EntityKind::Share => Vec::new(),
        }
    }
}

/// Arithmetic mean over rated reviews; `0.0` when nothing is rated.
pub fn mean_stars(stats: &SiteReviewStats) -> f64 {
    if stats.rated_count <= 0 {
        0.0
    } else {
        stats.stars_sum / stats.rated_count as f64
    }
}

/// Number of distinct image ids across a site and its reviews.
pub fn distinct_images(sources: &SiteImageSources) -> usize {
    sources
        .own
        .iter()
        .chain(sources.reviews.iter().flatten())
        .collect::<HashSet<_>>()
        .len()
}

fn to_count(value: i64) -> i32 {
    i32::try_from(value.max(0)).unwrap_or(i32::MAX)
}

/// Outcome of one recount batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecountReport {
    pub counters: usize,
    pub refreshed: usize,
}

#[derive(Clone)]
pub struct CounterMaintainer {
    store: Arc<dyn EntityStore>,
    loader: SnapshotLoader,
}

impl CounterMaintainer {
    pub fn new(loader: SnapshotLoader) -> Self {
        Self {
            store: loader.store().clone(),
            loader,
        }
    }

    async fn compute(&self, item: Recount) -> Result<CounterWrite, RepoError> {
        let store = self.store.as_ref();
        let user = |user_id, counter, value: i64| CounterWrite::User {
            user_id,
            counter,
            value: to_count(value),
        };
        let review = |review_id, counter, value: i64| CounterWrite::Review {
            review_id,
            counter,
            value: to_count(value),
        };
        Ok(match item {
            Recount::SiteReviews(site_id) => {
                let stats = store.site_review_stats(site_id).await?;
                CounterWrite::SiteReviews {
                    site_id,
                    review_num: to_count(stats.review_count),
                    stars: mean_stars(&stats),
                }
            }
            Recount::SiteImages(site_id) => {
                let sources = store.site_image_sources(site_id).await?;
                CounterWrite::SiteImages {
                    site_id,
                    images_num: to_count(distinct_images(&sources) as i64),
                }
            }
            Recount::UserReviews(id) => {
                user(id, UserCounter::Reviews, store.user_review_count(id).await?)
            }
            Recount::UserFans(id) => user(id, UserCounter::Fans, store.fans_count(id).await?),
            Recount::UserFollows(id) => {
                user(id, UserCounter::Follows, store.follow_count(id).await?)
            }
            Recount::UserLikes(id) => user(id, UserCounter::Likes, store.user_like_count(id).await?),
            Recount::UserFavorites(id) => {
                user(id, UserCounter::Favorites, store.user_favorite_count(id).await?)
            }
            Recount::UserShares(id) => {
                user(id, UserCounter::Shares, store.user_share_count(id).await?)
            }
            Recount::ReviewLikes(id) => {
                review(id, ReviewCounter::Likes, store.review_like_count(id).await?)
            }
            Recount::ReviewComments(id) => review(
                id,
                ReviewCounter::Comments,
                store.comment_count(CommentScope::Review(id)).await?,
            ),
            Recount::ArticleComments(article_id) => CounterWrite::ArticleComments {
                article_id,
                comment_num: to_count(store.comment_count(CommentScope::Article(article_id)).await?),
            },
        })
    }

    /// Recompute and write each counter, then re-cache every touched entity once.
    #[instrument(skip(self, items), fields(counters = items.len()))]
    pub async fn recount(&self, items: &BTreeSet<Recount>) -> Result<RecountReport, RepoError> {
        if items.is_empty() {
            return Ok(RecountReport::default());
        }
        let started = Instant::now();

        let mut touched: BTreeMap<EntityKind, BTreeSet<i64>> = BTreeMap::new();
        for item in items {
            let write = self.compute(*item).await?;
            self.store.write_counter(&write).await?;
            counter!("youyou_counter_writes_total", "counter" => item.label()).increment(1);
            debug!(recount = %item, ?write, "Counter written");
            let target = item.target();
            touched.entry(target.kind).or_default().insert(target.id);
        }

        let mut refreshed = 0;
        for (kind, ids) in &touched {
            let ids: Vec<i64> = ids.iter().copied().collect();
            refreshed += self.refresh_kind(*kind, &ids).await?.len();
        }

        histogram!("youyou_recount_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(counters = items.len(), refreshed, "Counters recomputed");
        Ok(RecountReport {
            counters: items.len(),
            refreshed,
        })
    }

    /// Recompute every counter of one entity and return its refreshed snapshot.
    ///
    /// Returns `None` when the entity does not exist.
    pub async fn recompute_and_cache(
        &self,
        entity: EntityRef,
    ) -> Result<Option<EntitySnapshot>, RepoError> {
        let items: BTreeSet<Recount> = Recount::all_for(entity).into_iter().collect();
        for item in &items {
            let write = self.compute(*item).await?;
            match self.store.write_counter(&write).await {
                Ok(()) => {}
                Err(RepoError::NotFound) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
        let mut snapshots = self.refresh_kind(entity.kind, &[entity.id]).await?;
        Ok(snapshots.pop())
    }

    async fn refresh_kind(
        &self,
        kind: EntityKind,
        ids: &[i64],
    ) -> Result<Vec<EntitySnapshot>, RepoError> {
        Ok(match kind {
            EntityKind::User => wrap(self.loader.refresh::<UserSnapshot>(ids).await?, EntitySnapshot::User),
            EntityKind::Site => wrap(self.loader.refresh::<SiteSnapshot>(ids).await?, EntitySnapshot::Site),
            EntityKind::Review => wrap(
                self.loader.refresh::<ReviewSnapshot>(ids).await?,
                EntitySnapshot::Review,
            ),
            EntityKind::Comment => wrap(
                self.loader.refresh::<CommentSnapshot>(ids).await?,
                EntitySnapshot::Comment,
            ),
            EntityKind::Article => wrap(
                self.loader.refresh::<ArticleSnapshot>(ids).await?,
                EntitySnapshot::Article,
            ),
            EntityKind::Share => wrap(
                self.loader.refresh::<ShareSnapshot>(ids).await?,
                EntitySnapshot::Share,
            ),
        })
    }
}

fn wrap<S: StoredSnapshot>(snapshots: Vec<S>, f: fn(S) -> EntitySnapshot) -> Vec<EntitySnapshot> {
    snapshots.into_iter().map(f).collect()
}
