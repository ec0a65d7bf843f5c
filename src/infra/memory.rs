//! In-process entity store.
//!
//! Mirrors the Postgres store's query semantics over plain maps. Used by the
//! integration tests and handy for local experiments without a database.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CounterWrite, EntityStore, RepoError, ReviewCounter, SiteImageSources, SiteReviewStats,
    UserCounter,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{CommentScope, ListQuery, ReviewScope};
use crate::domain::entities::{
    ArticleRecord, CommentDraft, CommentRecord, ReviewDraft, ReviewRecord, ShareDraft,
    ShareRecord, SiteRecord, UserRecord,
};
use crate::domain::types::EntityKind;

const SOURCE: &str = "infra::memory";

/// Relation row ordering: newer rows carry a larger sequence number.
type Seq = u64;

#[derive(Default)]
struct State {
    users: BTreeMap<i64, UserRecord>,
    cities: BTreeMap<i64, String>,
    sites: BTreeMap<i64, SiteRecord>,
    reviews: BTreeMap<i64, ReviewRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    articles: BTreeMap<i64, ArticleRecord>,
    shares: BTreeMap<i64, ShareRecord>,
    /// (followed, fan)
    fans: BTreeMap<(i64, i64), Seq>,
    /// (user, review)
    likes: BTreeMap<(i64, i64), Seq>,
    /// (user, site)
    favorites: BTreeMap<(i64, i64), Seq>,
    next_id: i64,
    next_seq: Seq,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn allocate_seq(&mut self) -> Seq {
        self.next_seq += 1;
        self.next_seq
    }

    fn user_is_valid(&self, id: i64) -> bool {
        self.users.get(&id).is_some_and(|user| user.valid)
    }

    fn site_is_valid(&self, id: i64) -> bool {
        self.sites.get(&id).is_some_and(|site| site.valid)
    }

    fn site_city(&self, site_id: Option<i64>) -> Option<i64> {
        site_id
            .and_then(|id| self.sites.get(&id))
            .and_then(|site| site.city_id)
    }

    fn joined_site(&self, site: &SiteRecord) -> SiteRecord {
        let mut site = site.clone();
        site.city_name = site.city_id.and_then(|id| self.cities.get(&id).cloned());
        site
    }

    fn joined_review(&self, review: &ReviewRecord) -> ReviewRecord {
        let mut review = review.clone();
        review.city_id = self.site_city(review.site_id);
        review
    }

    fn review_ids(
        &self,
        scope: ReviewScope,
        selection: crate::domain::types::Selection,
        published_only: bool,
    ) -> Vec<i64> {
        let mut matches: Vec<&ReviewRecord> = self
            .reviews
            .values()
            .filter(|review| review.valid)
            .filter(|review| match scope {
                ReviewScope::Review(id) => review.id == id,
                ReviewScope::Site(id) => review.site_id == Some(id),
                ReviewScope::City(id) => {
                    !review.images.is_empty() && self.site_city(review.site_id) == Some(id)
                }
                ReviewScope::User(id) => review.user_id == Some(id),
            })
            .filter(|review| selection.admits(review.selected))
            .filter(|review| !published_only || review.published)
            .collect();

        // Newest publication first, unpublished last, ties by id.
        matches.sort_by(|a, b| match (a.publish_time, b.publish_time) {
            (Some(left), Some(right)) => right.cmp(&left).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
        matches.into_iter().map(|review| review.id).collect()
    }

    fn comment_ids(&self, scope: CommentScope) -> Vec<i64> {
        let mut matches: Vec<&CommentRecord> = self
            .comments
            .values()
            .filter(|comment| comment.valid)
            .filter(|comment| match scope {
                CommentScope::Review(id) => comment.review_id == Some(id),
                CommentScope::Article(id) => comment.article_id == Some(id),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.publish_time
                .cmp(&a.publish_time)
                .then(b.id.cmp(&a.id))
        });
        matches.into_iter().map(|comment| comment.id).collect()
    }

    /// Ids picked from relation rows, newest row first.
    fn newest_first<F>(rows: &BTreeMap<(i64, i64), Seq>, mut pick: F) -> Vec<i64>
    where
        F: FnMut(&(i64, i64)) -> Option<i64>,
    {
        let mut picked: Vec<(Seq, i64)> = rows
            .iter()
            .filter_map(|(key, seq)| pick(key).map(|id| (*seq, id)))
            .collect();
        picked.sort_by(|a, b| b.cmp(a));
        picked.into_iter().map(|(_, id)| id).collect()
    }

    fn latest_shares(&self, user_id: i64) -> Vec<&ShareRecord> {
        let mut latest: BTreeMap<(Option<i64>, Option<i64>, Option<i64>), &ShareRecord> =
            BTreeMap::new();
        for share in self.shares.values().filter(|share| share.user_id == user_id) {
            let group = share.target_group();
            let newer = latest.get(&group).is_none_or(|current| {
                (share.action_time, share.id) > (current.action_time, current.id)
            });
            if newer {
                latest.insert(group, share);
            }
        }
        let mut shares: Vec<&ShareRecord> = latest.into_values().collect();
        shares.sort_by(|a, b| (b.action_time, b.id).cmp(&(a.action_time, a.id)));
        shares
    }

    fn list_ids(&self, query: &ListQuery) -> Vec<i64> {
        match *query {
            ListQuery::Reviews {
                scope,
                selection,
                published_only,
            } => self.review_ids(scope, selection, published_only),
            ListQuery::Comments { scope } => self.comment_ids(scope),
            ListQuery::Fans { user_id } => Self::newest_first(&self.fans, |&(followed, fan)| {
                (followed == user_id && self.user_is_valid(fan)).then_some(fan)
            }),
            ListQuery::Follows { user_id } => {
                Self::newest_first(&self.fans, |&(followed, fan)| {
                    (fan == user_id && self.user_is_valid(followed)).then_some(followed)
                })
            }
            ListQuery::LikedReviews { user_id } => {
                Self::newest_first(&self.likes, |&(user, review)| {
                    let visible = self
                        .reviews
                        .get(&review)
                        .is_some_and(|record| record.valid && record.published);
                    (user == user_id && visible).then_some(review)
                })
            }
            ListQuery::FavoriteSites { user_id } => {
                Self::newest_first(&self.favorites, |&(user, site)| {
                    (user == user_id && self.site_is_valid(site)).then_some(site)
                })
            }
            ListQuery::Shares { user_id } => self
                .latest_shares(user_id)
                .into_iter()
                .map(|share| share.id)
                .collect(),
        }
    }
}

/// Entity store backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_writes: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mutation and counter write fail with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of batched entity fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn add_city(&self, name: &str) -> i64 {
        let mut state = rw_write(&self.state, SOURCE, "add_city");
        let id = state.allocate_id();
        state.cities.insert(id, name.to_string());
        id
    }

    pub fn add_user(&self, name: &str) -> i64 {
        let mut state = rw_write(&self.state, SOURCE, "add_user");
        let id = state.allocate_id();
        let now = OffsetDateTime::now_utc();
        state.users.insert(
            id,
            UserRecord {
                id,
                valid: true,
                anonymous: false,
                name: name.to_string(),
                icon_id: None,
                gender: None,
                level: 1,
                badges: String::new(),
                follow_num: 0,
                fans_num: 0,
                like_num: 0,
                share_num: 0,
                review_num: 0,
                favorite_num: 0,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn add_site(&self, name: &str, city_id: Option<i64>) -> i64 {
        let mut state = rw_write(&self.state, SOURCE, "add_site");
        let id = state.allocate_id();
        state.sites.insert(
            id,
            SiteRecord {
                id,
                valid: true,
                name: name.to_string(),
                name_orig: String::new(),
                city_id,
                city_name: None,
                logo_id: None,
                level: String::new(),
                stars: 0.0,
                review_num: 0,
                images_num: 0,
                address: String::new(),
                keywords: String::new(),
                top_images: Vec::new(),
                gate_images: Vec::new(),
                longitude: None,
                latitude: None,
                updated_at: OffsetDateTime::now_utc(),
            },
        );
        id
    }

    pub fn add_article(&self, title: &str, content: &str) -> i64 {
        let mut state = rw_write(&self.state, SOURCE, "add_article");
        let id = state.allocate_id();
        let now = OffsetDateTime::now_utc();
        state.articles.insert(
            id,
            ArticleRecord {
                id,
                valid: true,
                title: title.to_string(),
                caption_id: None,
                keywords: String::new(),
                content: content.to_string(),
                city_id: None,
                comment_num: 0,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Flip a user's validity without going through the write path.
    pub fn set_user_valid(&self, id: i64, valid: bool) {
        let mut state = rw_write(&self.state, SOURCE, "set_user_valid");
        if let Some(user) = state.users.get_mut(&id) {
            user.valid = valid;
        }
    }

    pub fn set_site_valid(&self, id: i64, valid: bool) {
        let mut state = rw_write(&self.state, SOURCE, "set_site_valid");
        if let Some(site) = state.sites.get_mut(&id) {
            site.valid = valid;
        }
    }

    pub fn user(&self, id: i64) -> Option<UserRecord> {
        rw_read(&self.state, SOURCE, "user").users.get(&id).cloned()
    }

    pub fn site(&self, id: i64) -> Option<SiteRecord> {
        let state = rw_read(&self.state, SOURCE, "site");
        state.sites.get(&id).map(|site| state.joined_site(site))
    }

    pub fn review(&self, id: i64) -> Option<ReviewRecord> {
        let state = rw_read(&self.state, SOURCE, "review");
        state.reviews.get(&id).map(|review| state.joined_review(review))
    }

    pub fn article(&self, id: i64) -> Option<ArticleRecord> {
        rw_read(&self.state, SOURCE, "article")
            .articles
            .get(&id)
            .cloned()
    }

    fn guard_write(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("store rejected write"));
        }
        Ok(())
    }

    fn fetch<T, F>(&self, ids: &[i64], op: &'static str, pick: F) -> Vec<T>
    where
        F: Fn(&State, i64) -> Option<T>,
    {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let state = rw_read(&self.state, SOURCE, op);
        let unique: BTreeSet<i64> = ids.iter().copied().collect();
        unique.into_iter().filter_map(|id| pick(&state, id)).collect()
    }

    fn relation_insert(
        &self,
        op: &'static str,
        key: (i64, i64),
        select: fn(&mut State) -> &mut BTreeMap<(i64, i64), Seq>,
    ) -> Result<bool, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, op);
        let seq = state.allocate_seq();
        let rows = select(&mut state);
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, seq);
        Ok(true)
    }

    fn relation_remove(
        &self,
        op: &'static str,
        key: (i64, i64),
        select: fn(&mut State) -> &mut BTreeMap<(i64, i64), Seq>,
    ) -> Result<bool, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, op);
        Ok(select(&mut state).remove(&key).is_some())
    }

    fn count(&self, op: &'static str, count: impl FnOnce(&State) -> usize) -> i64 {
        let state = rw_read(&self.state, SOURCE, op);
        i64::try_from(count(&state)).unwrap_or(i64::MAX)
    }
}

fn check_reference(present: bool, what: &str, id: Option<i64>) -> Result<(), RepoError> {
    match id {
        Some(id) if !present => Err(RepoError::invalid_input(format!(
            "{what} {id} does not exist"
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_users(&self, ids: &[i64]) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_users", |state, id| state.users.get(&id).cloned()))
    }

    async fn fetch_sites(&self, ids: &[i64]) -> Result<Vec<SiteRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_sites", |state, id| {
            state.sites.get(&id).map(|site| state.joined_site(site))
        }))
    }

    async fn fetch_reviews(&self, ids: &[i64]) -> Result<Vec<ReviewRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_reviews", |state, id| {
            state.reviews.get(&id).map(|review| state.joined_review(review))
        }))
    }

    async fn fetch_comments(&self, ids: &[i64]) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_comments", |state, id| {
            state.comments.get(&id).cloned()
        }))
    }

    async fn fetch_articles(&self, ids: &[i64]) -> Result<Vec<ArticleRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_articles", |state, id| {
            state.articles.get(&id).cloned()
        }))
    }

    async fn fetch_shares(&self, ids: &[i64]) -> Result<Vec<ShareRecord>, RepoError> {
        Ok(self.fetch(ids, "fetch_shares", |state, id| state.shares.get(&id).cloned()))
    }

    async fn list_ids(&self, query: &ListQuery) -> Result<Vec<i64>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "list_ids").list_ids(query))
    }

    async fn entity_ids(&self, kind: EntityKind) -> Result<Vec<i64>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "entity_ids");
        let ids = match kind {
            EntityKind::User => state.users.keys().copied().collect(),
            EntityKind::Site => state.sites.keys().copied().collect(),
            EntityKind::Review => state.reviews.keys().copied().collect(),
            EntityKind::Comment => state.comments.keys().copied().collect(),
            EntityKind::Article => state.articles.keys().copied().collect(),
            EntityKind::Share => state.shares.keys().copied().collect(),
        };
        Ok(ids)
    }

    async fn is_following(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        let state = rw_read(&self.state, SOURCE, "is_following");
        Ok(state.fans.contains_key(&(followed_id, fan_id)))
    }

    async fn site_review_stats(&self, site_id: i64) -> Result<SiteReviewStats, RepoError> {
        let state = rw_read(&self.state, SOURCE, "site_review_stats");
        let mut stats = SiteReviewStats::default();
        for review in state
            .reviews
            .values()
            .filter(|review| review.valid && review.site_id == Some(site_id))
        {
            stats.review_count += 1;
            if let Some(stars) = review.stars {
                stats.rated_count += 1;
                stats.stars_sum += stars;
            }
        }
        Ok(stats)
    }

    async fn site_image_sources(&self, site_id: i64) -> Result<SiteImageSources, RepoError> {
        let state = rw_read(&self.state, SOURCE, "site_image_sources");
        let own = state
            .sites
            .get(&site_id)
            .map(|site| {
                site.gate_images
                    .iter()
                    .chain(site.top_images.iter())
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        let reviews = state
            .reviews
            .values()
            .filter(|review| review.valid && review.published && review.site_id == Some(site_id))
            .map(|review| review.images.clone())
            .collect();
        Ok(SiteImageSources { own, reviews })
    }

    async fn user_review_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("user_review_count", |state| {
            state
                .reviews
                .values()
                .filter(|review| review.valid && review.user_id == Some(user_id))
                .count()
        }))
    }

    async fn comment_count(&self, scope: CommentScope) -> Result<i64, RepoError> {
        Ok(self.count("comment_count", |state| state.comment_ids(scope).len()))
    }

    async fn fans_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("fans_count", |state| {
            state.list_ids(&ListQuery::Fans { user_id }).len()
        }))
    }

    async fn follow_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("follow_count", |state| {
            state.list_ids(&ListQuery::Follows { user_id }).len()
        }))
    }

    async fn review_like_count(&self, review_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("review_like_count", |state| {
            state
                .likes
                .keys()
                .filter(|(_, review)| *review == review_id)
                .count()
        }))
    }

    async fn user_like_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("user_like_count", |state| {
            state
                .likes
                .keys()
                .filter(|(user, review)| {
                    *user == user_id && state.reviews.get(review).is_some_and(|r| r.valid)
                })
                .count()
        }))
    }

    async fn user_favorite_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("user_favorite_count", |state| {
            state.list_ids(&ListQuery::FavoriteSites { user_id }).len()
        }))
    }

    async fn user_share_count(&self, user_id: i64) -> Result<i64, RepoError> {
        Ok(self.count("user_share_count", |state| {
            state
                .shares
                .values()
                .filter(|share| share.user_id == user_id)
                .map(|share| (share.site_id, share.review_id, share.article_id))
                .collect::<HashSet<_>>()
                .len()
        }))
    }

    async fn review_likers(&self, review_id: i64) -> Result<Vec<i64>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "review_likers");
        let mut likers: Vec<i64> = state
            .likes
            .keys()
            .filter(|(_, review)| *review == review_id)
            .map(|(user, _)| *user)
            .collect();
        likers.sort_unstable();
        Ok(likers)
    }

    async fn write_counter(&self, write: &CounterWrite) -> Result<(), RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "write_counter");
        match *write {
            CounterWrite::SiteReviews {
                site_id,
                review_num,
                stars,
            } => {
                let site = state.sites.get_mut(&site_id).ok_or(RepoError::NotFound)?;
                site.review_num = review_num;
                site.stars = stars;
            }
            CounterWrite::SiteImages {
                site_id,
                images_num,
            } => {
                let site = state.sites.get_mut(&site_id).ok_or(RepoError::NotFound)?;
                site.images_num = images_num;
            }
            CounterWrite::User {
                user_id,
                counter,
                value,
            } => {
                let user = state.users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
                let slot = match counter {
                    UserCounter::Reviews => &mut user.review_num,
                    UserCounter::Fans => &mut user.fans_num,
                    UserCounter::Follows => &mut user.follow_num,
                    UserCounter::Likes => &mut user.like_num,
                    UserCounter::Favorites => &mut user.favorite_num,
                    UserCounter::Shares => &mut user.share_num,
                };
                *slot = value;
            }
            CounterWrite::Review {
                review_id,
                counter,
                value,
            } => {
                let review = state
                    .reviews
                    .get_mut(&review_id)
                    .ok_or(RepoError::NotFound)?;
                match counter {
                    ReviewCounter::Likes => review.like_num = value,
                    ReviewCounter::Comments => review.comment_num = value,
                }
            }
            CounterWrite::ArticleComments {
                article_id,
                comment_num,
            } => {
                let article = state
                    .articles
                    .get_mut(&article_id)
                    .ok_or(RepoError::NotFound)?;
                article.comment_num = comment_num;
            }
        }
        Ok(())
    }

    async fn insert_review(
        &self,
        draft: &ReviewDraft,
        publish_time: Option<OffsetDateTime>,
    ) -> Result<ReviewRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "insert_review");
        check_reference(
            state.users.contains_key(&draft.user_id),
            "user",
            Some(draft.user_id),
        )?;
        check_reference(
            draft.site_id.is_some_and(|id| state.sites.contains_key(&id)),
            "site",
            draft.site_id,
        )?;

        let id = state.allocate_id();
        let review = ReviewRecord {
            id,
            valid: true,
            published: draft.published,
            selected: false,
            publish_time,
            updated_at: OffsetDateTime::now_utc(),
            user_id: Some(draft.user_id),
            site_id: draft.site_id,
            city_id: None,
            stars: draft.stars,
            content: draft.content.clone(),
            images: draft.images.clone(),
            keywords: draft.keywords.clone(),
            at_list: draft.at_list.clone(),
            total: draft.total,
            currency: draft.currency.clone(),
            like_num: 0,
            comment_num: 0,
        };
        let joined = state.joined_review(&review);
        state.reviews.insert(id, review);
        Ok(joined)
    }

    async fn save_review(&self, review: &ReviewRecord) -> Result<ReviewRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "save_review");
        check_reference(
            review.site_id.is_some_and(|id| state.sites.contains_key(&id)),
            "site",
            review.site_id,
        )?;
        let stored = state
            .reviews
            .get_mut(&review.id)
            .ok_or(RepoError::NotFound)?;

        // Counter columns belong to the maintainer.
        let like_num = stored.like_num;
        let comment_num = stored.comment_num;
        *stored = ReviewRecord {
            like_num,
            comment_num,
            updated_at: OffsetDateTime::now_utc(),
            ..review.clone()
        };
        let saved = stored.clone();
        Ok(state.joined_review(&saved))
    }

    async fn insert_comment(&self, draft: &CommentDraft) -> Result<CommentRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "insert_comment");
        check_reference(
            draft.review_id.is_some_and(|id| state.reviews.contains_key(&id)),
            "review",
            draft.review_id,
        )?;
        check_reference(
            draft
                .article_id
                .is_some_and(|id| state.articles.contains_key(&id)),
            "article",
            draft.article_id,
        )?;

        let id = state.allocate_id();
        let now = OffsetDateTime::now_utc();
        let comment = CommentRecord {
            id,
            valid: true,
            publish_time: now,
            updated_at: now,
            review_id: draft.review_id,
            article_id: draft.article_id,
            user_id: Some(draft.user_id),
            at_list: draft.at_list.clone(),
            content: draft.content.clone(),
        };
        state.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn save_comment(&self, comment: &CommentRecord) -> Result<CommentRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "save_comment");
        let stored = state
            .comments
            .get_mut(&comment.id)
            .ok_or(RepoError::NotFound)?;
        *stored = CommentRecord {
            publish_time: stored.publish_time,
            updated_at: OffsetDateTime::now_utc(),
            ..comment.clone()
        };
        Ok(stored.clone())
    }

    async fn add_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        self.relation_insert("add_follow", (followed_id, fan_id), |state| {
            &mut state.fans
        })
    }

    async fn remove_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        self.relation_remove("remove_follow", (followed_id, fan_id), |state| {
            &mut state.fans
        })
    }

    async fn add_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError> {
        self.relation_insert("add_like", (user_id, review_id), |state| &mut state.likes)
    }

    async fn remove_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError> {
        self.relation_remove("remove_like", (user_id, review_id), |state| {
            &mut state.likes
        })
    }

    async fn add_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError> {
        self.relation_insert("add_favorite", (user_id, site_id), |state| {
            &mut state.favorites
        })
    }

    async fn remove_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError> {
        self.relation_remove("remove_favorite", (user_id, site_id), |state| {
            &mut state.favorites
        })
    }

    async fn insert_share(&self, draft: &ShareDraft, token: &str) -> Result<ShareRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "insert_share");
        if state.shares.values().any(|share| share.token == token) {
            return Err(RepoError::invalid_input("share token already used"));
        }

        let id = state.allocate_id();
        let share = ShareRecord {
            id,
            user_id: draft.user_id,
            site_id: draft.site_id,
            review_id: draft.review_id,
            article_id: draft.article_id,
            channel: draft.channel.clone(),
            token: token.to_string(),
            action_time: OffsetDateTime::now_utc(),
        };
        state.shares.insert(id, share.clone());
        Ok(share)
    }

    async fn save_site_images(
        &self,
        site_id: i64,
        top_images: &[i64],
        gate_images: &[i64],
    ) -> Result<SiteRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "save_site_images");
        let site = state.sites.get_mut(&site_id).ok_or(RepoError::NotFound)?;
        site.top_images = top_images.to_vec();
        site.gate_images = gate_images.to_vec();
        site.updated_at = OffsetDateTime::now_utc();
        let saved = site.clone();
        Ok(state.joined_site(&saved))
    }

    async fn save_user(&self, user: &UserRecord) -> Result<UserRecord, RepoError> {
        self.guard_write()?;
        let mut state = rw_write(&self.state, SOURCE, "save_user");
        let stored = state.users.get_mut(&user.id).ok_or(RepoError::NotFound)?;
        stored.name = user.name.clone();
        stored.icon_id = user.icon_id;
        stored.gender = user.gender.clone();
        stored.badges = user.badges.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Selection;

    fn review_draft(user_id: i64, site_id: i64, stars: f64) -> ReviewDraft {
        ReviewDraft {
            user_id,
            site_id: Some(site_id),
            stars: Some(stars),
            content: "fine".to_string(),
            published: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn review_lists_order_newest_publication_first() {
        let store = MemoryStore::new();
        let user = store.add_user("ann");
        let site = store.add_site("tower", None);
        let early = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let late = OffsetDateTime::now_utc();

        let first = store
            .insert_review(&review_draft(user, site, 3.0), Some(early))
            .await
            .expect("insert");
        let second = store
            .insert_review(&review_draft(user, site, 4.0), Some(late))
            .await
            .expect("insert");
        let draft = store
            .insert_review(
                &ReviewDraft {
                    published: false,
                    ..review_draft(user, site, 5.0)
                },
                None,
            )
            .await
            .expect("insert");

        let all = store
            .list_ids(&ListQuery::reviews(
                ReviewScope::Site(site),
                Selection::Any,
                false,
            ))
            .await
            .expect("list");
        assert_eq!(all, vec![second.id, first.id, draft.id]);

        let published = store
            .list_ids(&ListQuery::reviews(
                ReviewScope::Site(site),
                Selection::Any,
                true,
            ))
            .await
            .expect("list");
        assert_eq!(published, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn city_feed_requires_images() {
        let store = MemoryStore::new();
        let city = store.add_city("Lhasa");
        let user = store.add_user("ann");
        let site = store.add_site("temple", Some(city));
        let now = Some(OffsetDateTime::now_utc());

        let bare = store
            .insert_review(&review_draft(user, site, 4.0), now)
            .await
            .expect("insert");
        let pictured = store
            .insert_review(
                &ReviewDraft {
                    images: vec![7],
                    ..review_draft(user, site, 4.0)
                },
                now,
            )
            .await
            .expect("insert");
        assert_eq!(bare.city_id, Some(city));

        let ids = store
            .list_ids(&ListQuery::reviews(
                ReviewScope::City(city),
                Selection::Any,
                true,
            ))
            .await
            .expect("list");
        assert_eq!(ids, vec![pictured.id]);
    }

    #[tokio::test]
    async fn relations_are_idempotent() {
        let store = MemoryStore::new();
        let star = store.add_user("star");
        let fan = store.add_user("fan");

        assert!(store.add_follow(star, fan).await.expect("follow"));
        assert!(!store.add_follow(star, fan).await.expect("follow again"));
        assert_eq!(store.fans_count(star).await.expect("count"), 1);

        store.set_user_valid(fan, false);
        assert_eq!(store.fans_count(star).await.expect("count"), 0);

        assert!(store.remove_follow(star, fan).await.expect("unfollow"));
        assert!(!store.remove_follow(star, fan).await.expect("unfollow again"));
    }

    #[tokio::test]
    async fn shares_keep_newest_per_target() {
        let store = MemoryStore::new();
        let user = store.add_user("ann");
        let site = store.add_site("tower", None);
        let draft = ShareDraft {
            user_id: user,
            site_id: Some(site),
            review_id: None,
            article_id: None,
            channel: "app".to_string(),
        };

        store.insert_share(&draft, "t1").await.expect("share");
        let newest = store.insert_share(&draft, "t2").await.expect("share");

        let ids = store
            .list_ids(&ListQuery::Shares { user_id: user })
            .await
            .expect("list");
        assert_eq!(ids, vec![newest.id]);
        assert_eq!(store.user_share_count(user).await.expect("count"), 1);
        assert!(store.insert_share(&draft, "t2").await.is_err());
    }

    #[tokio::test]
    async fn failed_writes_surface_as_persistence_errors() {
        let store = MemoryStore::new();
        let user = store.add_user("ann");
        store.fail_writes(true);

        let err = store
            .write_counter(&CounterWrite::User {
                user_id: user,
                counter: UserCounter::Likes,
                value: 3,
            })
            .await
            .expect_err("writes disabled");
        assert!(matches!(err, RepoError::Persistence(_)));
    }
}
