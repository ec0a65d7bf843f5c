//! Cache key definitions.
//!
//! Defines `SnapshotKey` for single entity snapshots and `ListQuery` for
//! cached id-list query results. Both render to deterministic strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::types::{EntityKind, Selection};

/// Key of one cached entity snapshot: `one_<type>_<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl SnapshotKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "one_{}_{}", self.kind.as_str(), self.id)
    }
}

/// Which reviews a review list is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewScope {
    Review(i64),
    Site(i64),
    City(i64),
    User(i64),
}

impl ReviewScope {
    fn param(self) -> (&'static str, i64) {
        match self {
            ReviewScope::Review(id) => ("id", id),
            ReviewScope::Site(id) => ("site", id),
            ReviewScope::City(id) => ("city", id),
            ReviewScope::User(id) => ("user", id),
        }
    }
}

/// Parent of a comment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentScope {
    Review(i64),
    Article(i64),
}

/// A cacheable composite query whose result is an ordered list of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ListQuery {
    /// Valid reviews, newest publication first.
    Reviews {
        scope: ReviewScope,
        selection: Selection,
        published_only: bool,
    },
    /// Valid comments, newest first.
    Comments { scope: CommentScope },
    /// Valid users following `user_id`.
    Fans { user_id: i64 },
    /// Valid users `user_id` follows.
    Follows { user_id: i64 },
    /// Valid published reviews liked by `user_id`.
    LikedReviews { user_id: i64 },
    /// Valid sites favorited by `user_id`.
    FavoriteSites { user_id: i64 },
    /// Newest share per distinct target.
    Shares { user_id: i64 },
}

/// Query families, the unit the dependency table speaks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListFamily {
    ReviewsById,
    ReviewsBySite,
    ReviewsByCity,
    ReviewsByUser,
    CommentsByReview,
    CommentsByArticle,
    Fans,
    Follows,
    LikedReviews,
    FavoriteSites,
    Shares,
}

impl ListQuery {
    pub fn reviews(scope: ReviewScope, selection: Selection, published_only: bool) -> Self {
        ListQuery::Reviews {
            scope,
            selection,
            published_only,
        }
    }

    pub fn family(&self) -> ListFamily {
        match self {
            ListQuery::Reviews { scope, .. } => match scope {
                ReviewScope::Review(_) => ListFamily::ReviewsById,
                ReviewScope::Site(_) => ListFamily::ReviewsBySite,
                ReviewScope::City(_) => ListFamily::ReviewsByCity,
                ReviewScope::User(_) => ListFamily::ReviewsByUser,
            },
            ListQuery::Comments { scope } => match scope {
                CommentScope::Review(_) => ListFamily::CommentsByReview,
                CommentScope::Article(_) => ListFamily::CommentsByArticle,
            },
            ListQuery::Fans { .. } => ListFamily::Fans,
            ListQuery::Follows { .. } => ListFamily::Follows,
            ListQuery::LikedReviews { .. } => ListFamily::LikedReviews,
            ListQuery::FavoriteSites { .. } => ListFamily::FavoriteSites,
            ListQuery::Shares { .. } => ListFamily::Shares,
        }
    }

    fn family_name(&self) -> &'static str {
        match self {
            ListQuery::Reviews { .. } => "reviews",
            ListQuery::Comments { .. } => "comments",
            ListQuery::Fans { .. } => "fans",
            ListQuery::Follows { .. } => "follows",
            ListQuery::LikedReviews { .. } => "liked_reviews",
            ListQuery::FavoriteSites { .. } => "favorite_sites",
            ListQuery::Shares { .. } => "shares",
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match *self {
            ListQuery::Reviews {
                scope,
                selection,
                published_only,
            } => {
                let (name, id) = scope.param();
                vec![
                    (name, id.to_string()),
                    ("published", u8::from(published_only).to_string()),
                    ("selected", selection.as_str().to_string()),
                ]
            }
            ListQuery::Comments { scope } => match scope {
                CommentScope::Review(id) => vec![("review", id.to_string())],
                CommentScope::Article(id) => vec![("article", id.to_string())],
            },
            ListQuery::Fans { user_id }
            | ListQuery::Follows { user_id }
            | ListQuery::LikedReviews { user_id }
            | ListQuery::FavoriteSites { user_id }
            | ListQuery::Shares { user_id } => vec![("user", user_id.to_string())],
        }
    }

    /// Canonical cache key: `list_<family>:` followed by sorted `k=v` pairs.
    pub fn cache_key(&self) -> String {
        let mut params = self.params();
        params.sort();
        let encoded = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("list_{}:{encoded}", self.family_name())
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_key_format() {
        assert_eq!(
            SnapshotKey::new(EntityKind::Review, 42).to_string(),
            "one_review_42"
        );
        assert_eq!(SnapshotKey::new(EntityKind::User, 1).to_string(), "one_user_1");
    }

    #[test]
    fn list_key_is_sorted_and_deterministic() {
        let query = ListQuery::reviews(ReviewScope::Site(3), Selection::Any, true);
        assert_eq!(query.cache_key(), "list_reviews:published=1&selected=any&site=3");
        assert_eq!(query.cache_key(), query.to_string());

        let city = ListQuery::reviews(ReviewScope::City(9), Selection::Selected, false);
        assert_eq!(city.cache_key(), "list_reviews:city=9&published=0&selected=yes");
    }

    #[test]
    fn list_keys_differ_across_dimensions() {
        let a = ListQuery::reviews(ReviewScope::User(1), Selection::Any, true);
        let b = ListQuery::reviews(ReviewScope::User(1), Selection::Any, false);
        let c = ListQuery::reviews(ReviewScope::User(1), Selection::Unselected, true);
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert_ne!(
            ListQuery::Fans { user_id: 1 }.cache_key(),
            ListQuery::Follows { user_id: 1 }.cache_key()
        );
    }
}
