//! Write path.
//!
//! Every operation validates, commits to the store, refreshes the written
//! entity's snapshot and then hands the change to the cache trigger, which
//! recomputes counters and evicts affected id lists before returning.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::EntityStore;
use crate::cache::{
    CacheTrigger, ChangeKind, CommentFacets, ReviewFacets, SnapshotLoader, TriggerOutcome,
};
use crate::domain::entities::{
    ArticleRecord, CommentDraft, CommentRecord, IMAGE_LIMIT, ReviewDraft, ReviewRecord,
    ShareDraft, SiteRecord, UserProfilePatch, UserRecord, truncate_ids,
};
use crate::domain::error::DomainError;
use crate::domain::snapshots::{
    CommentSnapshot, ReviewSnapshot, ShareSnapshot, SiteSnapshot, UserSnapshot,
};

fn review_facets(review: &ReviewRecord) -> ReviewFacets {
    ReviewFacets {
        site_id: review.site_id,
        city_id: review.city_id,
        user_id: review.user_id,
    }
}

fn comment_facets(comment: &CommentRecord) -> CommentFacets {
    CommentFacets {
        review_id: comment.review_id,
        article_id: comment.article_id,
    }
}

fn log_outcome(op: &'static str, outcome: &TriggerOutcome) {
    debug!(
        target = "application::writes",
        op,
        counters = outcome.recount.counters,
        refreshed = outcome.recount.refreshed,
        evicted_lists = outcome.evicted_lists,
        "write propagated"
    );
}

#[derive(Clone)]
pub struct WriteService {
    store: Arc<dyn EntityStore>,
    loader: SnapshotLoader,
    trigger: Arc<CacheTrigger>,
}

impl WriteService {
    pub fn new(loader: SnapshotLoader, trigger: Arc<CacheTrigger>) -> Self {
        Self {
            store: loader.store().clone(),
            loader,
            trigger,
        }
    }

    async fn valid_user(&self, id: i64) -> Result<UserRecord, AppError> {
        self.store
            .fetch_users(&[id])
            .await?
            .into_iter()
            .find(|user| user.valid)
            .ok_or_else(|| DomainError::not_found("user", id).into())
    }

    async fn valid_site(&self, id: i64) -> Result<SiteRecord, AppError> {
        self.store
            .fetch_sites(&[id])
            .await?
            .into_iter()
            .find(|site| site.valid)
            .ok_or_else(|| DomainError::not_found("site", id).into())
    }

    async fn valid_review(&self, id: i64) -> Result<ReviewRecord, AppError> {
        self.store
            .fetch_reviews(&[id])
            .await?
            .into_iter()
            .find(|review| review.valid)
            .ok_or_else(|| DomainError::not_found("review", id).into())
    }

    async fn valid_article(&self, id: i64) -> Result<ArticleRecord, AppError> {
        self.store
            .fetch_articles(&[id])
            .await?
            .into_iter()
            .find(|article| article.valid)
            .ok_or_else(|| DomainError::not_found("article", id).into())
    }

    async fn valid_comment(&self, id: i64) -> Result<CommentRecord, AppError> {
        self.store
            .fetch_comments(&[id])
            .await?
            .into_iter()
            .find(|comment| comment.valid)
            .ok_or_else(|| DomainError::not_found("comment", id).into())
    }

    async fn own_review(&self, review_id: i64, user_id: i64) -> Result<ReviewRecord, AppError> {
        let review = self.valid_review(review_id).await?;
        if review.user_id != Some(user_id) {
            return Err(DomainError::validation("only the author may change a review").into());
        }
        Ok(review)
    }

    async fn own_comment(&self, comment_id: i64, user_id: i64) -> Result<CommentRecord, AppError> {
        let comment = self.valid_comment(comment_id).await?;
        if comment.user_id != Some(user_id) {
            return Err(DomainError::validation("only the author may change a comment").into());
        }
        Ok(comment)
    }

    async fn check_comment_parent(&self, draft: &CommentDraft) -> Result<(), AppError> {
        if let Some(review_id) = draft.review_id {
            self.valid_review(review_id).await?;
        }
        if let Some(article_id) = draft.article_id {
            self.valid_article(article_id).await?;
        }
        Ok(())
    }

    /// Persist a review transition and propagate it.
    async fn commit_review(
        &self,
        op: &'static str,
        before: Option<ReviewRecord>,
        after: ReviewRecord,
    ) -> Result<ReviewSnapshot, AppError> {
        let membership_changed = before
            .as_ref()
            .is_none_or(|old| old.valid != after.valid || old.published != after.published);

        let saved = if before.is_some() {
            self.store.save_review(&after).await?
        } else {
            after
        };
        let snapshot = self.loader.update_cache::<ReviewSnapshot>(&saved).await;

        let likers = if membership_changed && before.is_some() {
            self.store.review_likers(saved.id).await?
        } else {
            Vec::new()
        };
        let outcome = self
            .trigger
            .changed(ChangeKind::ReviewWritten {
                review_id: saved.id,
                before: before.as_ref().map(review_facets),
                after: Some(review_facets(&saved)),
                likers,
                membership_changed,
            })
            .await?;
        log_outcome(op, &outcome);
        Ok(snapshot)
    }

    pub async fn create_review(&self, draft: ReviewDraft) -> Result<ReviewSnapshot, AppError> {
        let draft = draft.normalized()?;
        self.valid_user(draft.user_id).await?;
        if let Some(site_id) = draft.site_id {
            self.valid_site(site_id).await?;
        }

        let publish_time = draft.published.then(OffsetDateTime::now_utc);
        let record = self.store.insert_review(&draft, publish_time).await?;
        info!(
            target = "application::writes::create_review",
            review_id = record.id,
            published = record.published,
            "review created"
        );
        self.commit_review("create_review", None, record).await
    }

    /// Replace the editable fields of a review. The author may not change.
    pub async fn update_review(
        &self,
        review_id: i64,
        draft: ReviewDraft,
    ) -> Result<ReviewSnapshot, AppError> {
        let draft = draft.normalized()?;
        let current = self.own_review(review_id, draft.user_id).await?;
        if let Some(site_id) = draft.site_id
            && current.site_id != Some(site_id)
        {
            self.valid_site(site_id).await?;
        }

        let publish_time = match current.publish_time {
            Some(time) => Some(time),
            None if draft.published => Some(OffsetDateTime::now_utc()),
            None => None,
        };
        let next = ReviewRecord {
            published: draft.published,
            publish_time,
            site_id: draft.site_id,
            stars: draft.stars,
            content: draft.content,
            images: draft.images,
            keywords: draft.keywords,
            at_list: draft.at_list,
            total: draft.total,
            currency: draft.currency,
            ..current.clone()
        };
        self.commit_review("update_review", Some(current), next).await
    }

    /// Soft delete: the row stays, `valid` goes false.
    pub async fn delete_review(&self, review_id: i64, user_id: i64) -> Result<(), AppError> {
        let current = self.own_review(review_id, user_id).await?;
        let next = ReviewRecord {
            valid: false,
            ..current.clone()
        };
        self.commit_review("delete_review", Some(current), next)
            .await?;
        info!(
            target = "application::writes::delete_review",
            review_id, "review deleted"
        );
        Ok(())
    }

    /// Editorial selection flag. Unchanged flags are a no-op.
    pub async fn set_review_selected(
        &self,
        review_id: i64,
        selected: bool,
    ) -> Result<ReviewSnapshot, AppError> {
        let current = self.valid_review(review_id).await?;
        if current.selected == selected {
            return Ok(self.loader.update_cache::<ReviewSnapshot>(&current).await);
        }
        let next = ReviewRecord {
            selected,
            ..current.clone()
        };
        self.commit_review("set_review_selected", Some(current), next)
            .await
    }

    async fn commit_comment(
        &self,
        op: &'static str,
        before: Option<&CommentRecord>,
        saved: CommentRecord,
    ) -> Result<CommentSnapshot, AppError> {
        let snapshot = self.loader.update_cache::<CommentSnapshot>(&saved).await;
        let outcome = self
            .trigger
            .changed(ChangeKind::CommentWritten {
                comment_id: saved.id,
                before: before.map(comment_facets),
                after: Some(comment_facets(&saved)),
            })
            .await?;
        log_outcome(op, &outcome);
        Ok(snapshot)
    }

    pub async fn create_comment(&self, draft: CommentDraft) -> Result<CommentSnapshot, AppError> {
        let draft = draft.normalized()?;
        self.valid_user(draft.user_id).await?;
        self.check_comment_parent(&draft).await?;

        let record = self.store.insert_comment(&draft).await?;
        self.commit_comment("create_comment", None, record).await
    }

    pub async fn update_comment(
        &self,
        comment_id: i64,
        draft: CommentDraft,
    ) -> Result<CommentSnapshot, AppError> {
        let draft = draft.normalized()?;
        let current = self.own_comment(comment_id, draft.user_id).await?;
        self.check_comment_parent(&draft).await?;

        let next = CommentRecord {
            review_id: draft.review_id,
            article_id: draft.article_id,
            content: draft.content,
            at_list: draft.at_list,
            ..current.clone()
        };
        let saved = self.store.save_comment(&next).await?;
        self.commit_comment("update_comment", Some(&current), saved)
            .await
    }

    pub async fn delete_comment(&self, comment_id: i64, user_id: i64) -> Result<(), AppError> {
        let current = self.own_comment(comment_id, user_id).await?;
        let next = CommentRecord {
            valid: false,
            ..current.clone()
        };
        let saved = self.store.save_comment(&next).await?;
        self.commit_comment("delete_comment", Some(&current), saved)
            .await?;
        Ok(())
    }

    /// Returns whether a new relation was recorded.
    pub async fn follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, AppError> {
        if followed_id == fan_id {
            return Err(DomainError::validation("users cannot follow themselves").into());
        }
        self.valid_user(followed_id).await?;
        self.valid_user(fan_id).await?;

        if !self.store.add_follow(followed_id, fan_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.follow_changed(followed_id, fan_id).await?;
        log_outcome("follow", &outcome);
        Ok(true)
    }

    pub async fn unfollow(&self, followed_id: i64, fan_id: i64) -> Result<bool, AppError> {
        if !self.store.remove_follow(followed_id, fan_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.follow_changed(followed_id, fan_id).await?;
        log_outcome("unfollow", &outcome);
        Ok(true)
    }

    pub async fn like(&self, user_id: i64, review_id: i64) -> Result<bool, AppError> {
        self.valid_user(user_id).await?;
        self.valid_review(review_id).await?;

        if !self.store.add_like(user_id, review_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.like_changed(user_id, review_id).await?;
        log_outcome("like", &outcome);
        Ok(true)
    }

    pub async fn unlike(&self, user_id: i64, review_id: i64) -> Result<bool, AppError> {
        if !self.store.remove_like(user_id, review_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.like_changed(user_id, review_id).await?;
        log_outcome("unlike", &outcome);
        Ok(true)
    }

    pub async fn favorite(&self, user_id: i64, site_id: i64) -> Result<bool, AppError> {
        self.valid_user(user_id).await?;
        self.valid_site(site_id).await?;

        if !self.store.add_favorite(user_id, site_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.favorite_changed(user_id, site_id).await?;
        log_outcome("favorite", &outcome);
        Ok(true)
    }

    pub async fn unfavorite(&self, user_id: i64, site_id: i64) -> Result<bool, AppError> {
        if !self.store.remove_favorite(user_id, site_id).await? {
            return Ok(false);
        }
        let outcome = self.trigger.favorite_changed(user_id, site_id).await?;
        log_outcome("unfavorite", &outcome);
        Ok(true)
    }

    /// Record a share and hand back its snapshot with a fresh token.
    pub async fn share(&self, draft: ShareDraft) -> Result<ShareSnapshot, AppError> {
        let draft = draft.normalized()?;
        self.valid_user(draft.user_id).await?;
        if let Some(article_id) = draft.article_id {
            self.valid_article(article_id).await?;
        }
        if let Some(site_id) = draft.site_id {
            self.valid_site(site_id).await?;
        }
        if let Some(review_id) = draft.review_id {
            let review = self.valid_review(review_id).await?;
            if !review.published {
                return Err(DomainError::not_found("review", review_id).into());
            }
        }

        let token = Uuid::new_v4().simple().to_string();
        let record = self.store.insert_share(&draft, &token).await?;
        let snapshot = self.loader.update_cache::<ShareSnapshot>(&record).await;
        let outcome = self
            .trigger
            .changed(ChangeKind::ShareRecorded {
                user_id: record.user_id,
                site_id: record.site_id,
                review_id: record.review_id,
                article_id: record.article_id,
            })
            .await?;
        log_outcome("share", &outcome);
        Ok(snapshot)
    }

    /// Replace a site's own images and return the recounted snapshot.
    pub async fn update_site_images(
        &self,
        site_id: i64,
        top_images: Vec<i64>,
        gate_images: Vec<i64>,
    ) -> Result<SiteSnapshot, AppError> {
        let top_images = truncate_ids(top_images, IMAGE_LIMIT);
        let gate_images = truncate_ids(gate_images, IMAGE_LIMIT);
        let saved = self
            .store
            .save_site_images(site_id, &top_images, &gate_images)
            .await?;
        self.loader.update_cache::<SiteSnapshot>(&saved).await;

        let outcome = self
            .trigger
            .changed(ChangeKind::SiteImagesChanged { site_id })
            .await?;
        log_outcome("update_site_images", &outcome);

        self.loader
            .sites(&[site_id], false)
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found("site", site_id).into())
    }

    pub async fn update_user_profile(
        &self,
        user_id: i64,
        patch: UserProfilePatch,
    ) -> Result<UserSnapshot, AppError> {
        let mut user = self.valid_user(user_id).await?;
        if patch.is_empty() {
            return Ok(self.loader.update_cache::<UserSnapshot>(&user).await);
        }
        patch.apply(&mut user)?;

        let saved = self.store.save_user(&user).await?;
        let snapshot = self.loader.update_cache::<UserSnapshot>(&saved).await;
        let outcome = self
            .trigger
            .changed(ChangeKind::UserUpdated { user_id })
            .await?;
        log_outcome("update_user_profile", &outcome);
        Ok(snapshot)
    }
}
