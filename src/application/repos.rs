//! Entity store contract.
//!
//! The store is the source of truth. The cache layers read through it,
//! recompute counters from its aggregates and never write entities on their
//! own behalf, except for the denormalized counter columns.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::cache::{CommentScope, ListQuery};
use crate::domain::entities::{
    ArticleRecord, CommentDraft, CommentRecord, ReviewDraft, ReviewRecord, ShareDraft,
    ShareRecord, SiteRecord, UserRecord,
};
use crate::domain::types::EntityKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Aggregate over the valid reviews of one site.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SiteReviewStats {
    pub review_count: i64,
    /// Valid reviews that carry a rating.
    pub rated_count: i64,
    pub stars_sum: f64,
}

/// Image ids that contribute to a site's `images_num`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteImageSources {
    /// Gate and top images of the site itself.
    pub own: Vec<i64>,
    /// Image lists of the site's valid published reviews.
    pub reviews: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserCounter {
    Reviews,
    Fans,
    Follows,
    Likes,
    Favorites,
    Shares,
}

impl UserCounter {
    pub fn column(self) -> &'static str {
        match self {
            UserCounter::Reviews => "review_num",
            UserCounter::Fans => "fans_num",
            UserCounter::Follows => "follow_num",
            UserCounter::Likes => "like_num",
            UserCounter::Favorites => "favorite_num",
            UserCounter::Shares => "share_num",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReviewCounter {
    Likes,
    Comments,
}

impl ReviewCounter {
    pub fn column(self) -> &'static str {
        match self {
            ReviewCounter::Likes => "like_num",
            ReviewCounter::Comments => "comment_num",
        }
    }
}

/// A single denormalized counter write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterWrite {
    SiteReviews {
        site_id: i64,
        review_num: i32,
        stars: f64,
    },
    SiteImages {
        site_id: i64,
        images_num: i32,
    },
    User {
        user_id: i64,
        counter: UserCounter,
        value: i32,
    },
    Review {
        review_id: i64,
        counter: ReviewCounter,
        value: i32,
    },
    ArticleComments {
        article_id: i64,
        comment_num: i32,
    },
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    // Batched fetches. Missing ids are omitted; order is unspecified.
    async fn fetch_users(&self, ids: &[i64]) -> Result<Vec<UserRecord>, RepoError>;
    async fn fetch_sites(&self, ids: &[i64]) -> Result<Vec<SiteRecord>, RepoError>;
    async fn fetch_reviews(&self, ids: &[i64]) -> Result<Vec<ReviewRecord>, RepoError>;
    async fn fetch_comments(&self, ids: &[i64]) -> Result<Vec<CommentRecord>, RepoError>;
    async fn fetch_articles(&self, ids: &[i64]) -> Result<Vec<ArticleRecord>, RepoError>;
    async fn fetch_shares(&self, ids: &[i64]) -> Result<Vec<ShareRecord>, RepoError>;

    /// Evaluate a composite list query, returning ordered ids.
    async fn list_ids(&self, query: &ListQuery) -> Result<Vec<i64>, RepoError>;

    /// Every id of the given kind, ascending.
    async fn entity_ids(&self, kind: EntityKind) -> Result<Vec<i64>, RepoError>;

    async fn is_following(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError>;

    // Aggregates backing the denormalized counters.
    async fn site_review_stats(&self, site_id: i64) -> Result<SiteReviewStats, RepoError>;
    async fn site_image_sources(&self, site_id: i64) -> Result<SiteImageSources, RepoError>;
    async fn user_review_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn comment_count(&self, scope: CommentScope) -> Result<i64, RepoError>;
    async fn fans_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn follow_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn review_like_count(&self, review_id: i64) -> Result<i64, RepoError>;
    async fn user_like_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn user_favorite_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn user_share_count(&self, user_id: i64) -> Result<i64, RepoError>;
    async fn review_likers(&self, review_id: i64) -> Result<Vec<i64>, RepoError>;

    async fn write_counter(&self, write: &CounterWrite) -> Result<(), RepoError>;

    // Mutations issued by the write path.
    async fn insert_review(
        &self,
        draft: &ReviewDraft,
        publish_time: Option<OffsetDateTime>,
    ) -> Result<ReviewRecord, RepoError>;
    /// Persist the mutable columns of an existing review and return the fresh row.
    async fn save_review(&self, review: &ReviewRecord) -> Result<ReviewRecord, RepoError>;
    async fn insert_comment(&self, draft: &CommentDraft) -> Result<CommentRecord, RepoError>;
    async fn save_comment(&self, comment: &CommentRecord) -> Result<CommentRecord, RepoError>;
    /// Returns false when the relation already existed.
    async fn add_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError>;
    /// Returns false when there was nothing to remove.
    async fn remove_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError>;
    async fn add_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError>;
    async fn remove_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError>;
    async fn add_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError>;
    async fn remove_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError>;
    async fn insert_share(&self, draft: &ShareDraft, token: &str) -> Result<ShareRecord, RepoError>;
    async fn save_site_images(
        &self,
        site_id: i64,
        top_images: &[i64],
        gate_images: &[i64],
    ) -> Result<SiteRecord, RepoError>;
    async fn save_user(&self, user: &UserRecord) -> Result<UserRecord, RepoError>;
}
