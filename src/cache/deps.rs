//! Reverse-dependency table for id-list invalidation.
//!
//! Each row names a change source, one of its facet fields, and the list
//! family keyed by that field. A family declares the extra dimensions its
//! keys carry; invalidation enumerates every value of those dimensions, so a
//! list is evicted whatever filter combination produced it.

use crate::domain::types::Selection;

use super::keys::{CommentScope, ListFamily, ListQuery, ReviewScope};

/// Kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Review,
    Comment,
    Follow,
    Like,
    Favorite,
    Share,
}

/// Facet of a change whose old and new values select affected lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ReviewId,
    Site,
    City,
    Author,
    /// Users who liked a review whose visibility flipped.
    Likers,
    ParentReview,
    ParentArticle,
    Followed,
    Fan,
    User,
}

#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    pub source: Source,
    pub field: Field,
    pub family: ListFamily,
}

const fn dep(source: Source, field: Field, family: ListFamily) -> Dependency {
    Dependency {
        source,
        field,
        family,
    }
}

pub static DEPENDENCIES: &[Dependency] = &[
    dep(Source::Review, Field::ReviewId, ListFamily::ReviewsById),
    dep(Source::Review, Field::Site, ListFamily::ReviewsBySite),
    dep(Source::Review, Field::City, ListFamily::ReviewsByCity),
    dep(Source::Review, Field::Author, ListFamily::ReviewsByUser),
    dep(Source::Review, Field::Likers, ListFamily::LikedReviews),
    dep(Source::Comment, Field::ParentReview, ListFamily::CommentsByReview),
    dep(Source::Comment, Field::ParentArticle, ListFamily::CommentsByArticle),
    dep(Source::Follow, Field::Followed, ListFamily::Fans),
    dep(Source::Follow, Field::Fan, ListFamily::Follows),
    dep(Source::Like, Field::User, ListFamily::LikedReviews),
    dep(Source::Favorite, Field::User, ListFamily::FavoriteSites),
    dep(Source::Share, Field::User, ListFamily::Shares),
];

/// Families affected by a change to `field` of a `source` event.
pub fn affected(source: Source, field: Field) -> impl Iterator<Item = ListFamily> {
    DEPENDENCIES
        .iter()
        .filter(move |row| row.source == source && row.field == field)
        .map(|row| row.family)
}

/// Key dimension beyond the family's primary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Selection,
    PublishedOnly,
}

impl ListFamily {
    pub fn dimensions(self) -> &'static [Dimension] {
        match self {
            ListFamily::ReviewsById
            | ListFamily::ReviewsBySite
            | ListFamily::ReviewsByCity
            | ListFamily::ReviewsByUser => &[Dimension::Selection, Dimension::PublishedOnly],
            _ => &[],
        }
    }
}

/// Every concrete query of `family` keyed by `id`.
pub fn expand(family: ListFamily, id: i64) -> Vec<ListQuery> {
    let scope = match family {
        ListFamily::ReviewsById => ReviewScope::Review(id),
        ListFamily::ReviewsBySite => ReviewScope::Site(id),
        ListFamily::ReviewsByCity => ReviewScope::City(id),
        ListFamily::ReviewsByUser => ReviewScope::User(id),
        ListFamily::CommentsByReview => {
            return vec![ListQuery::Comments {
                scope: CommentScope::Review(id),
            }];
        }
        ListFamily::CommentsByArticle => {
            return vec![ListQuery::Comments {
                scope: CommentScope::Article(id),
            }];
        }
        ListFamily::Fans => return vec![ListQuery::Fans { user_id: id }],
        ListFamily::Follows => return vec![ListQuery::Follows { user_id: id }],
        ListFamily::LikedReviews => return vec![ListQuery::LikedReviews { user_id: id }],
        ListFamily::FavoriteSites => return vec![ListQuery::FavoriteSites { user_id: id }],
        ListFamily::Shares => return vec![ListQuery::Shares { user_id: id }],
    };

    let published_values: &[bool] = if family.dimensions().contains(&Dimension::PublishedOnly) {
        &[false, true]
    } else {
        &[false]
    };
    let selections: &[Selection] = if family.dimensions().contains(&Dimension::Selection) {
        &Selection::ALL
    } else {
        &[Selection::Any]
    };

    let mut queries = Vec::with_capacity(selections.len() * published_values.len());
    for selection in selections {
        for published_only in published_values {
            queries.push(ListQuery::reviews(scope, *selection, *published_only));
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_families_expand_every_dimension() {
        let queries = expand(ListFamily::ReviewsBySite, 4);
        assert_eq!(queries.len(), 6);
        assert!(queries.contains(&ListQuery::reviews(
            ReviewScope::Site(4),
            Selection::Any,
            true
        )));
        assert!(queries.contains(&ListQuery::reviews(
            ReviewScope::Site(4),
            Selection::Unselected,
            false
        )));
    }

    #[test]
    fn relation_families_have_single_key() {
        assert_eq!(
            expand(ListFamily::Fans, 2),
            vec![ListQuery::Fans { user_id: 2 }]
        );
        assert_eq!(
            expand(ListFamily::CommentsByArticle, 3),
            vec![ListQuery::Comments {
                scope: CommentScope::Article(3)
            }]
        );
    }

    #[test]
    fn every_family_is_reachable_from_the_table() {
        let all = [
            ListFamily::ReviewsById,
            ListFamily::ReviewsBySite,
            ListFamily::ReviewsByCity,
            ListFamily::ReviewsByUser,
            ListFamily::CommentsByReview,
            ListFamily::CommentsByArticle,
            ListFamily::Fans,
            ListFamily::Follows,
            ListFamily::LikedReviews,
            ListFamily::FavoriteSites,
            ListFamily::Shares,
        ];
        for family in all {
            assert!(
                DEPENDENCIES.iter().any(|row| row.family == family),
                "{family:?} has no dependency row"
            );
        }
    }

    #[test]
    fn follow_changes_hit_both_endpoints() {
        let families: Vec<_> = affected(Source::Follow, Field::Followed)
            .chain(affected(Source::Follow, Field::Fan))
            .collect();
        assert_eq!(families, vec![ListFamily::Fans, ListFamily::Follows]);
    }
}
