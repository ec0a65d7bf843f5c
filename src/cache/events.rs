//! Change events emitted by the write path.
//!
//! An event describes one committed transition together with the old and new
//! values of every field that cache keys are derived from.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Cache-relevant fields of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReviewFacets {
    pub site_id: Option<i64>,
    pub city_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Parents of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentFacets {
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// A review was created, edited, re-published or soft-deleted.
    ReviewWritten {
        review_id: i64,
        before: Option<ReviewFacets>,
        after: Option<ReviewFacets>,
        /// Users who liked the review at commit time.
        likers: Vec<i64>,
        /// Validity or publication flipped, changing which derived sets
        /// the review belongs to.
        membership_changed: bool,
    },
    CommentWritten {
        comment_id: i64,
        before: Option<CommentFacets>,
        after: Option<CommentFacets>,
    },
    FollowChanged {
        followed_id: i64,
        fan_id: i64,
    },
    LikeChanged {
        user_id: i64,
        review_id: i64,
    },
    FavoriteChanged {
        user_id: i64,
        site_id: i64,
    },
    ShareRecorded {
        user_id: i64,
        site_id: Option<i64>,
        review_id: Option<i64>,
        article_id: Option<i64>,
    },
    SiteImagesChanged {
        site_id: i64,
    },
    UserUpdated {
        user_id: i64,
    },
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::ReviewWritten { .. } => "review_written",
            ChangeKind::CommentWritten { .. } => "comment_written",
            ChangeKind::FollowChanged { .. } => "follow_changed",
            ChangeKind::LikeChanged { .. } => "like_changed",
            ChangeKind::FavoriteChanged { .. } => "favorite_changed",
            ChangeKind::ShareRecorded { .. } => "share_recorded",
            ChangeKind::SiteImagesChanged { .. } => "site_images_changed",
            ChangeKind::UserUpdated { .. } => "user_updated",
        }
    }
}

/// A change stamped with identity and ordering.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: ChangeKind,
    pub timestamp: OffsetDateTime,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Issues epochs and stamps events.
#[derive(Debug, Default)]
pub struct EventClock {
    epoch_counter: AtomicU64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn stamp(&self, kind: ChangeKind) -> ChangeEvent {
        let event = ChangeEvent::new(kind, self.next_epoch());
        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = event.kind.label(),
            "Change event recorded"
        );
        event
    }
}
