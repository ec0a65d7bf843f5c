//! Read path: snapshots and cached id lists.

use crate::application::error::AppError;
use crate::cache::{CommentScope, IdListCache, ListQuery, ReviewScope, SnapshotLoader};
use crate::domain::snapshots::{
    ArticleSnapshot, CommentSnapshot, ReviewSnapshot, ShareSnapshot, SiteSnapshot, UserSnapshot,
};
use crate::domain::types::Selection;

#[derive(Clone)]
pub struct ReadService {
    loader: SnapshotLoader,
    lists: IdListCache,
}

impl ReadService {
    pub fn new(loader: SnapshotLoader, lists: IdListCache) -> Self {
        Self { loader, lists }
    }

    pub async fn users(&self, ids: &[i64], valid_only: bool) -> Result<Vec<UserSnapshot>, AppError> {
        Ok(self.loader.users(ids, valid_only).await?)
    }

    pub async fn sites(&self, ids: &[i64], valid_only: bool) -> Result<Vec<SiteSnapshot>, AppError> {
        Ok(self.loader.sites(ids, valid_only).await?)
    }

    pub async fn reviews(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<ReviewSnapshot>, AppError> {
        Ok(self.loader.reviews(ids, valid_only).await?)
    }

    pub async fn comments(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<CommentSnapshot>, AppError> {
        Ok(self.loader.comments(ids, valid_only).await?)
    }

    pub async fn articles(
        &self,
        ids: &[i64],
        valid_only: bool,
    ) -> Result<Vec<ArticleSnapshot>, AppError> {
        Ok(self.loader.articles(ids, valid_only).await?)
    }

    pub async fn shares(&self, ids: &[i64]) -> Result<Vec<ShareSnapshot>, AppError> {
        Ok(self.loader.shares(ids).await?)
    }

    pub async fn review_list(
        &self,
        scope: ReviewScope,
        selection: Selection,
        published_only: bool,
    ) -> Result<Vec<ReviewSnapshot>, AppError> {
        let ids = self
            .lists
            .ids(&ListQuery::reviews(scope, selection, published_only))
            .await?;
        self.reviews(&ids, true).await
    }

    /// Up to `limit` reviews, selected ones first, topped up with unselected
    /// ones when there are not enough selected reviews.
    pub async fn review_feed(
        &self,
        scope: ReviewScope,
        published_only: bool,
        limit: usize,
    ) -> Result<Vec<ReviewSnapshot>, AppError> {
        let mut ids = self
            .lists
            .ids(&ListQuery::reviews(scope, Selection::Selected, published_only))
            .await?;
        ids.truncate(limit);

        if ids.len() < limit {
            let fill = self
                .lists
                .ids(&ListQuery::reviews(
                    scope,
                    Selection::Unselected,
                    published_only,
                ))
                .await?;
            let missing = limit - ids.len();
            ids.extend(fill.into_iter().take(missing));
        }

        self.reviews(&ids, true).await
    }

    pub async fn comments_for(&self, scope: CommentScope) -> Result<Vec<CommentSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::Comments { scope }).await?;
        self.comments(&ids, true).await
    }

    pub async fn fans_of(&self, user_id: i64) -> Result<Vec<UserSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::Fans { user_id }).await?;
        self.users(&ids, true).await
    }

    pub async fn follows_of(&self, user_id: i64) -> Result<Vec<UserSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::Follows { user_id }).await?;
        self.users(&ids, true).await
    }

    /// Always read from the store; follow relations have no cache key.
    pub async fn is_following(&self, followed_id: i64, fan_id: i64) -> Result<bool, AppError> {
        Ok(self
            .loader
            .store()
            .is_following(followed_id, fan_id)
            .await?)
    }

    pub async fn liked_reviews(&self, user_id: i64) -> Result<Vec<ReviewSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::LikedReviews { user_id }).await?;
        self.reviews(&ids, true).await
    }

    pub async fn favorite_sites(&self, user_id: i64) -> Result<Vec<SiteSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::FavoriteSites { user_id }).await?;
        self.sites(&ids, true).await
    }

    pub async fn shares_of(&self, user_id: i64) -> Result<Vec<ShareSnapshot>, AppError> {
        let ids = self.lists.ids(&ListQuery::Shares { user_id }).await?;
        self.shares(&ids).await
    }
}
