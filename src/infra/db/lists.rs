use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::RepoError;
use crate::cache::{CommentScope, ListQuery, ReviewScope};
use crate::domain::types::Selection;

use super::{PostgresStore, map_sqlx_error};

impl PostgresStore {
    pub(super) async fn query_list_ids(&self, query: &ListQuery) -> Result<Vec<i64>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("");
        match *query {
            ListQuery::Reviews {
                scope,
                selection,
                published_only,
            } => push_reviews(&mut qb, scope, selection, published_only),
            ListQuery::Comments { scope } => {
                qb.push("SELECT id FROM comments WHERE valid AND ");
                match scope {
                    CommentScope::Review(id) => qb.push("review_id = ").push_bind(id),
                    CommentScope::Article(id) => qb.push("article_id = ").push_bind(id),
                };
                qb.push(" ORDER BY publish_time DESC, id DESC");
            }
            ListQuery::Fans { user_id } => {
                qb.push(
                    "SELECT f.fan_id FROM fans f INNER JOIN users u ON u.id = f.fan_id \
                     WHERE u.valid AND f.user_id = ",
                );
                qb.push_bind(user_id);
                qb.push(" ORDER BY f.action_time DESC, f.fan_id DESC");
            }
            ListQuery::Follows { user_id } => {
                qb.push(
                    "SELECT f.user_id FROM fans f INNER JOIN users u ON u.id = f.user_id \
                     WHERE u.valid AND f.fan_id = ",
                );
                qb.push_bind(user_id);
                qb.push(" ORDER BY f.action_time DESC, f.user_id DESC");
            }
            ListQuery::LikedReviews { user_id } => {
                qb.push(
                    "SELECT l.review_id FROM likes l INNER JOIN reviews r ON r.id = l.review_id \
                     WHERE r.valid AND r.published AND l.user_id = ",
                );
                qb.push_bind(user_id);
                qb.push(" ORDER BY l.action_time DESC, l.review_id DESC");
            }
            ListQuery::FavoriteSites { user_id } => {
                qb.push(
                    "SELECT v.site_id FROM favorites v INNER JOIN sites s ON s.id = v.site_id \
                     WHERE s.valid AND v.user_id = ",
                );
                qb.push_bind(user_id);
                qb.push(" ORDER BY v.action_time DESC, v.site_id DESC");
            }
            ListQuery::Shares { user_id } => {
                qb.push(
                    "SELECT id FROM (SELECT DISTINCT ON (site_id, review_id, article_id) \
                     id, action_time FROM share_records WHERE user_id = ",
                );
                qb.push_bind(user_id);
                qb.push(
                    " ORDER BY site_id, review_id, article_id, action_time DESC, id DESC) latest \
                     ORDER BY action_time DESC, id DESC",
                );
            }
        }

        let rows: Vec<(i64,)> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

fn push_reviews(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ReviewScope,
    selection: Selection,
    published_only: bool,
) {
    qb.push("SELECT r.id FROM reviews r LEFT JOIN sites s ON s.id = r.site_id WHERE r.valid");
    match scope {
        ReviewScope::Review(id) => {
            qb.push(" AND r.id = ").push_bind(id);
        }
        ReviewScope::Site(id) => {
            qb.push(" AND r.site_id = ").push_bind(id);
        }
        ReviewScope::City(id) => {
            qb.push(" AND cardinality(r.images) > 0 AND s.city_id = ")
                .push_bind(id);
        }
        ReviewScope::User(id) => {
            qb.push(" AND r.user_id = ").push_bind(id);
        }
    }
    match selection {
        Selection::Any => {}
        Selection::Selected => {
            qb.push(" AND r.selected");
        }
        Selection::Unselected => {
            qb.push(" AND NOT r.selected");
        }
    }
    if published_only {
        qb.push(" AND r.published");
    }
    qb.push(" ORDER BY r.publish_time DESC NULLS LAST, r.id DESC");
}
