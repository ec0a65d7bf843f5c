use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;

use crate::application::repos::{
    CounterWrite, EntityStore, RepoError, SiteImageSources, SiteReviewStats,
};
use crate::cache::{CommentScope, ListQuery};
use crate::domain::entities::{
    ArticleRecord, CommentDraft, CommentRecord, ReviewDraft, ReviewRecord, ShareDraft,
    ShareRecord, SiteRecord, UserRecord,
};
use crate::domain::types::EntityKind;

use super::rows::{
    ARTICLE_COLUMNS, ArticleRow, COMMENT_COLUMNS, CommentRow, REVIEW_COLUMNS, ReviewRow,
    SHARE_COLUMNS, SITE_COLUMNS, ShareRow, SiteRow, USER_COLUMNS, UserRow,
};
use super::{PostgresStore, map_sqlx_error, util};

impl PostgresStore {
    async fn review_by_id(&self, id: i64) -> Result<ReviewRecord, RepoError> {
        self.fetch_reviews(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound)
    }

    async fn comment_by_id(&self, id: i64) -> Result<CommentRecord, RepoError> {
        self.fetch_comments(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound)
    }

    async fn site_by_id(&self, id: i64) -> Result<SiteRecord, RepoError> {
        self.fetch_sites(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound)
    }

    async fn user_by_id(&self, id: i64) -> Result<UserRecord, RepoError> {
        self.fetch_users(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or(RepoError::NotFound)
    }

    async fn execute_relation(&self, sql: &str, left: i64, right: i64) -> Result<bool, RepoError> {
        let result = query(sql)
            .bind(left)
            .bind(right)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }
}

fn ensure_updated(rows_affected: u64) -> Result<(), RepoError> {
    if rows_affected == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl EntityStore for PostgresStore {
    async fn fetch_users(&self, ids: &[i64]) -> Result<Vec<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ANY($1)");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_sites(&self, ids: &[i64]) -> Result<Vec<SiteRecord>, RepoError> {
        let sql = format!(
            "SELECT {SITE_COLUMNS} FROM sites s LEFT JOIN cities c ON c.id = s.city_id \
             WHERE s.id = ANY($1)"
        );
        let rows = sqlx::query_as::<_, SiteRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_reviews(&self, ids: &[i64]) -> Result<Vec<ReviewRecord>, RepoError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews r LEFT JOIN sites s ON s.id = r.site_id \
             WHERE r.id = ANY($1)"
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_comments(&self, ids: &[i64]) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments m WHERE m.id = ANY($1)");
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_articles(&self, ids: &[i64]) -> Result<Vec<ArticleRecord>, RepoError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = ANY($1)");
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_shares(&self, ids: &[i64]) -> Result<Vec<ShareRecord>, RepoError> {
        let sql = format!("SELECT {SHARE_COLUMNS} FROM share_records WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ShareRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_ids(&self, query: &ListQuery) -> Result<Vec<i64>, RepoError> {
        self.query_list_ids(query).await
    }

    async fn entity_ids(&self, kind: EntityKind) -> Result<Vec<i64>, RepoError> {
        let table = match kind {
            EntityKind::User => "users",
            EntityKind::Site => "sites",
            EntityKind::Review => "reviews",
            EntityKind::Comment => "comments",
            EntityKind::Article => "articles",
            EntityKind::Share => "share_records",
        };
        let sql = format!("SELECT id FROM {table} ORDER BY id");
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn is_following(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM fans WHERE user_id = $1 AND fan_id = $2)",
        )
        .bind(followed_id)
        .bind(fan_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(exists)
    }

    async fn site_review_stats(&self, site_id: i64) -> Result<SiteReviewStats, RepoError> {
        let (review_count, rated_count, stars_sum): (i64, i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(stars), COALESCE(SUM(stars), 0)::float8 \
             FROM reviews WHERE valid AND site_id = $1",
        )
        .bind(site_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SiteReviewStats {
            review_count: util::count(review_count)?,
            rated_count: util::count(rated_count)?,
            stars_sum,
        })
    }

    async fn site_image_sources(&self, site_id: i64) -> Result<SiteImageSources, RepoError> {
        let own: Option<(Vec<i64>,)> =
            sqlx::query_as("SELECT gate_images || top_images FROM sites WHERE id = $1")
                .bind(site_id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        let reviews: Vec<(Vec<i64>,)> = sqlx::query_as(
            "SELECT images FROM reviews WHERE valid AND published AND site_id = $1",
        )
        .bind(site_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SiteImageSources {
            own: own.map(|(images,)| images).unwrap_or_default(),
            reviews: reviews.into_iter().map(|(images,)| images).collect(),
        })
    }

    async fn user_review_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM reviews WHERE valid AND user_id = $1",
            user_id,
        )
        .await
    }

    async fn comment_count(&self, scope: CommentScope) -> Result<i64, RepoError> {
        match scope {
            CommentScope::Review(id) => {
                self.scalar_count(
                    "SELECT COUNT(*) FROM comments WHERE valid AND review_id = $1",
                    id,
                )
                .await
            }
            CommentScope::Article(id) => {
                self.scalar_count(
                    "SELECT COUNT(*) FROM comments WHERE valid AND article_id = $1",
                    id,
                )
                .await
            }
        }
    }

    async fn fans_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM fans f INNER JOIN users u ON u.id = f.fan_id \
             WHERE u.valid AND f.user_id = $1",
            user_id,
        )
        .await
    }

    async fn follow_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM fans f INNER JOIN users u ON u.id = f.user_id \
             WHERE u.valid AND f.fan_id = $1",
            user_id,
        )
        .await
    }

    async fn review_like_count(&self, review_id: i64) -> Result<i64, RepoError> {
        self.scalar_count("SELECT COUNT(*) FROM likes WHERE review_id = $1", review_id)
            .await
    }

    async fn user_like_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM likes l INNER JOIN reviews r ON r.id = l.review_id \
             WHERE r.valid AND l.user_id = $1",
            user_id,
        )
        .await
    }

    async fn user_favorite_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM favorites v INNER JOIN sites s ON s.id = v.site_id \
             WHERE s.valid AND v.user_id = $1",
            user_id,
        )
        .await
    }

    async fn user_share_count(&self, user_id: i64) -> Result<i64, RepoError> {
        self.scalar_count(
            "SELECT COUNT(*) FROM (SELECT DISTINCT site_id, review_id, article_id \
             FROM share_records WHERE user_id = $1) targets",
            user_id,
        )
        .await
    }

    async fn review_likers(&self, review_id: i64) -> Result<Vec<i64>, RepoError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM likes WHERE review_id = $1 ORDER BY user_id")
                .bind(review_id)
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn write_counter(&self, write: &CounterWrite) -> Result<(), RepoError> {
        let result = match *write {
            CounterWrite::SiteReviews {
                site_id,
                review_num,
                stars,
            } => {
                query("UPDATE sites SET review_num = $2, stars = $3 WHERE id = $1")
                    .bind(site_id)
                    .bind(review_num)
                    .bind(stars)
                    .execute(self.pool())
                    .await
            }
            CounterWrite::SiteImages {
                site_id,
                images_num,
            } => {
                query("UPDATE sites SET images_num = $2 WHERE id = $1")
                    .bind(site_id)
                    .bind(images_num)
                    .execute(self.pool())
                    .await
            }
            CounterWrite::User {
                user_id,
                counter,
                value,
            } => {
                let sql = format!("UPDATE users SET {} = $2 WHERE id = $1", counter.column());
                query(&sql)
                    .bind(user_id)
                    .bind(value)
                    .execute(self.pool())
                    .await
            }
            CounterWrite::Review {
                review_id,
                counter,
                value,
            } => {
                let sql = format!("UPDATE reviews SET {} = $2 WHERE id = $1", counter.column());
                query(&sql)
                    .bind(review_id)
                    .bind(value)
                    .execute(self.pool())
                    .await
            }
            CounterWrite::ArticleComments {
                article_id,
                comment_num,
            } => {
                query("UPDATE articles SET comment_num = $2 WHERE id = $1")
                    .bind(article_id)
                    .bind(comment_num)
                    .execute(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        ensure_updated(result.rows_affected())
    }

    async fn insert_review(
        &self,
        draft: &ReviewDraft,
        publish_time: Option<OffsetDateTime>,
    ) -> Result<ReviewRecord, RepoError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO reviews (user_id, site_id, stars, content, images, keywords, at_list, \
             total, currency, published, publish_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(draft.user_id)
        .bind(draft.site_id)
        .bind(draft.stars)
        .bind(&draft.content)
        .bind(&draft.images)
        .bind(&draft.keywords)
        .bind(&draft.at_list)
        .bind(draft.total)
        .bind(&draft.currency)
        .bind(draft.published)
        .bind(publish_time)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.review_by_id(id).await
    }

    async fn save_review(&self, review: &ReviewRecord) -> Result<ReviewRecord, RepoError> {
        let result = query(
            "UPDATE reviews SET valid = $2, published = $3, selected = $4, publish_time = $5, \
             user_id = $6, site_id = $7, stars = $8, content = $9, images = $10, \
             keywords = $11, at_list = $12, total = $13, currency = $14, updated_at = now() \
             WHERE id = $1",
        )
        .bind(review.id)
        .bind(review.valid)
        .bind(review.published)
        .bind(review.selected)
        .bind(review.publish_time)
        .bind(review.user_id)
        .bind(review.site_id)
        .bind(review.stars)
        .bind(&review.content)
        .bind(&review.images)
        .bind(&review.keywords)
        .bind(&review.at_list)
        .bind(review.total)
        .bind(&review.currency)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ensure_updated(result.rows_affected())?;

        self.review_by_id(review.id).await
    }

    async fn insert_comment(&self, draft: &CommentDraft) -> Result<CommentRecord, RepoError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO comments (user_id, review_id, article_id, content, at_list) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(draft.user_id)
        .bind(draft.review_id)
        .bind(draft.article_id)
        .bind(&draft.content)
        .bind(&draft.at_list)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.comment_by_id(id).await
    }

    async fn save_comment(&self, comment: &CommentRecord) -> Result<CommentRecord, RepoError> {
        let result = query(
            "UPDATE comments SET valid = $2, review_id = $3, article_id = $4, user_id = $5, \
             at_list = $6, content = $7, updated_at = now() WHERE id = $1",
        )
        .bind(comment.id)
        .bind(comment.valid)
        .bind(comment.review_id)
        .bind(comment.article_id)
        .bind(comment.user_id)
        .bind(&comment.at_list)
        .bind(&comment.content)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ensure_updated(result.rows_affected())?;

        self.comment_by_id(comment.id).await
    }

    async fn add_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "INSERT INTO fans (user_id, fan_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            followed_id,
            fan_id,
        )
        .await
    }

    async fn remove_follow(&self, followed_id: i64, fan_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "DELETE FROM fans WHERE user_id = $1 AND fan_id = $2",
            followed_id,
            fan_id,
        )
        .await
    }

    async fn add_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "INSERT INTO likes (user_id, review_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            user_id,
            review_id,
        )
        .await
    }

    async fn remove_like(&self, user_id: i64, review_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "DELETE FROM likes WHERE user_id = $1 AND review_id = $2",
            user_id,
            review_id,
        )
        .await
    }

    async fn add_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "INSERT INTO favorites (user_id, site_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            user_id,
            site_id,
        )
        .await
    }

    async fn remove_favorite(&self, user_id: i64, site_id: i64) -> Result<bool, RepoError> {
        self.execute_relation(
            "DELETE FROM favorites WHERE user_id = $1 AND site_id = $2",
            user_id,
            site_id,
        )
        .await
    }

    async fn insert_share(&self, draft: &ShareDraft, token: &str) -> Result<ShareRecord, RepoError> {
        let sql = format!(
            "INSERT INTO share_records (user_id, site_id, review_id, article_id, channel, token) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SHARE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ShareRow>(&sql)
            .bind(draft.user_id)
            .bind(draft.site_id)
            .bind(draft.review_id)
            .bind(draft.article_id)
            .bind(&draft.channel)
            .bind(token)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn save_site_images(
        &self,
        site_id: i64,
        top_images: &[i64],
        gate_images: &[i64],
    ) -> Result<SiteRecord, RepoError> {
        let result = query(
            "UPDATE sites SET top_images = $2, gate_images = $3, updated_at = now() WHERE id = $1",
        )
        .bind(site_id)
        .bind(top_images)
        .bind(gate_images)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ensure_updated(result.rows_affected())?;

        self.site_by_id(site_id).await
    }

    async fn save_user(&self, user: &UserRecord) -> Result<UserRecord, RepoError> {
        let result = query(
            "UPDATE users SET name = $2, icon_id = $3, gender = $4, badges = $5, \
             updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.icon_id)
        .bind(&user.gender)
        .bind(&user.badges)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ensure_updated(result.rows_affected())?;

        self.user_by_id(user.id).await
    }
}
