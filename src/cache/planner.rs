//! Invalidation plan generation.
//!
//! Merges change events into the set of id-list keys that must be evicted.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::deps::{self, Field, Source};
use super::events::{ChangeEvent, ChangeKind};
use super::keys::ListQuery;

/// Lists to evict after a batch of changes.
///
/// False positives are acceptable; every list whose membership or order may
/// have changed must be present.
#[derive(Debug, Default)]
pub struct InvalidationPlan {
    pub lists: BTreeSet<ListQuery>,
    /// Distinct events merged into the plan.
    pub events: usize,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ events: {}, lists: {} }}",
            self.events,
            self.lists.len()
        )
    }
}

fn push_facet(out: &mut Vec<(Source, Field, i64)>, source: Source, field: Field, id: Option<i64>) {
    if let Some(id) = id {
        out.push((source, field, id));
    }
}

/// Old and new facet values carried by one change.
fn facets(kind: &ChangeKind) -> Vec<(Source, Field, i64)> {
    let mut out = Vec::new();
    match kind {
        ChangeKind::ReviewWritten {
            review_id,
            before,
            after,
            likers,
            membership_changed,
        } => {
            out.push((Source::Review, Field::ReviewId, *review_id));
            for facets in before.iter().chain(after.iter()) {
                push_facet(&mut out, Source::Review, Field::Site, facets.site_id);
                push_facet(&mut out, Source::Review, Field::City, facets.city_id);
                push_facet(&mut out, Source::Review, Field::Author, facets.user_id);
            }
            if *membership_changed {
                for liker in likers {
                    out.push((Source::Review, Field::Likers, *liker));
                }
            }
        }
        ChangeKind::CommentWritten { before, after, .. } => {
            for facets in before.iter().chain(after.iter()) {
                push_facet(&mut out, Source::Comment, Field::ParentReview, facets.review_id);
                push_facet(&mut out, Source::Comment, Field::ParentArticle, facets.article_id);
            }
        }
        ChangeKind::FollowChanged {
            followed_id,
            fan_id,
        } => {
            out.push((Source::Follow, Field::Followed, *followed_id));
            out.push((Source::Follow, Field::Fan, *fan_id));
        }
        ChangeKind::LikeChanged { user_id, .. } => {
            out.push((Source::Like, Field::User, *user_id));
        }
        ChangeKind::FavoriteChanged { user_id, .. } => {
            out.push((Source::Favorite, Field::User, *user_id));
        }
        ChangeKind::ShareRecorded { user_id, .. } => {
            out.push((Source::Share, Field::User, *user_id));
        }
        ChangeKind::SiteImagesChanged { .. } | ChangeKind::UserUpdated { .. } => {}
    }
    out
}

impl InvalidationPlan {
    /// Merge events into a plan.
    ///
    /// - Deduplicates by event ID
    /// - Collects old and new facet values
    /// - Expands each affected family across all of its key dimensions
    pub fn from_events(events: Vec<ChangeEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();
        let mut seen_facets = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            plan.events += 1;
            for (source, field, id) in facets(&event.kind) {
                if !seen_facets.insert((source, field, id)) {
                    continue;
                }
                for family in deps::affected(source, field) {
                    plan.lists.extend(deps::expand(family, id));
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::events::{CommentFacets, ReviewFacets};
    use crate::cache::keys::{CommentScope, ReviewScope};
    use crate::domain::types::Selection;

    fn review_event(before: Option<ReviewFacets>, after: Option<ReviewFacets>) -> ChangeEvent {
        ChangeEvent::new(
            ChangeKind::ReviewWritten {
                review_id: 10,
                before,
                after,
                likers: vec![7],
                membership_changed: false,
            },
            0,
        )
    }

    #[test]
    fn new_review_evicts_all_scopes_and_dimensions() {
        let after = ReviewFacets {
            site_id: Some(1),
            city_id: Some(2),
            user_id: Some(3),
        };
        let plan = InvalidationPlan::from_events(vec![review_event(None, Some(after))]);

        // id, site, city, user scopes x 3 selections x 2 publication flags
        assert_eq!(plan.lists.len(), 24);
        for scope in [
            ReviewScope::Review(10),
            ReviewScope::Site(1),
            ReviewScope::City(2),
            ReviewScope::User(3),
        ] {
            for selection in Selection::ALL {
                for published_only in [false, true] {
                    assert!(
                        plan.lists
                            .contains(&ListQuery::reviews(scope, selection, published_only))
                    );
                }
            }
        }
        assert!(!plan.lists.contains(&ListQuery::LikedReviews { user_id: 7 }));
    }

    #[test]
    fn moved_review_evicts_old_and_new_site() {
        let before = ReviewFacets {
            site_id: Some(1),
            city_id: Some(2),
            user_id: Some(3),
        };
        let after = ReviewFacets {
            site_id: Some(5),
            city_id: Some(6),
            user_id: Some(3),
        };
        let plan = InvalidationPlan::from_events(vec![review_event(Some(before), Some(after))]);
        assert!(plan.lists.contains(&ListQuery::reviews(
            ReviewScope::Site(1),
            Selection::Any,
            true
        )));
        assert!(plan.lists.contains(&ListQuery::reviews(
            ReviewScope::City(6),
            Selection::Any,
            true
        )));
    }

    #[test]
    fn visibility_flip_evicts_likers_lists() {
        let facets = ReviewFacets {
            site_id: Some(1),
            city_id: None,
            user_id: Some(3),
        };
        let event = ChangeEvent::new(
            ChangeKind::ReviewWritten {
                review_id: 10,
                before: Some(facets),
                after: Some(facets),
                likers: vec![7, 8],
                membership_changed: true,
            },
            0,
        );
        let plan = InvalidationPlan::from_events(vec![event]);
        assert!(plan.lists.contains(&ListQuery::LikedReviews { user_id: 7 }));
        assert!(plan.lists.contains(&ListQuery::LikedReviews { user_id: 8 }));
    }

    #[test]
    fn comment_move_evicts_both_parents() {
        let event = ChangeEvent::new(
            ChangeKind::CommentWritten {
                comment_id: 1,
                before: Some(CommentFacets {
                    review_id: Some(4),
                    article_id: None,
                }),
                after: Some(CommentFacets {
                    review_id: None,
                    article_id: Some(9),
                }),
            },
            0,
        );
        let plan = InvalidationPlan::from_events(vec![event]);
        assert_eq!(plan.lists.len(), 2);
        assert!(plan.lists.contains(&ListQuery::Comments {
            scope: CommentScope::Review(4)
        }));
        assert!(plan.lists.contains(&ListQuery::Comments {
            scope: CommentScope::Article(9)
        }));
    }

    #[test]
    fn duplicate_events_are_merged() {
        let event = ChangeEvent::new(
            ChangeKind::FollowChanged {
                followed_id: 1,
                fan_id: 2,
            },
            0,
        );
        let plan = InvalidationPlan::from_events(vec![event.clone(), event]);
        assert_eq!(plan.events, 1);
        assert_eq!(plan.lists.len(), 2);
    }

    #[test]
    fn profile_update_evicts_nothing() {
        let plan = InvalidationPlan::from_events(vec![ChangeEvent::new(
            ChangeKind::UserUpdated { user_id: 1 },
            0,
        )]);
        assert!(plan.is_empty());
        assert_eq!(plan.events, 1);
    }
}
