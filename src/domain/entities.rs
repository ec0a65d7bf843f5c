//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::error::DomainError;

/// Maximum number of users an `@` list may reference.
pub const AT_LIST_LIMIT: usize = 20;
/// Maximum number of images attached to a single review.
pub const IMAGE_LIMIT: usize = 10;
/// Maximum number of keywords kept on a review.
pub const KEYWORD_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub valid: bool,
    pub anonymous: bool,
    pub name: String,
    pub icon_id: Option<i64>,
    pub gender: Option<String>,
    pub level: i32,
    pub badges: String,
    pub follow_num: i32,
    pub fans_num: i32,
    pub like_num: i32,
    pub share_num: i32,
    pub review_num: i32,
    pub favorite_num: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: i64,
    pub valid: bool,
    pub name: String,
    pub name_orig: String,
    pub city_id: Option<i64>,
    pub city_name: Option<String>,
    pub logo_id: Option<i64>,
    pub level: String,
    pub stars: f64,
    pub review_num: i32,
    pub images_num: i32,
    pub address: String,
    pub keywords: String,
    pub top_images: Vec<i64>,
    pub gate_images: Vec<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub valid: bool,
    pub published: bool,
    pub selected: bool,
    pub publish_time: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
    pub user_id: Option<i64>,
    pub site_id: Option<i64>,
    /// City of the reviewed site; read-only join.
    pub city_id: Option<i64>,
    pub stars: Option<f64>,
    pub content: String,
    pub images: Vec<i64>,
    pub keywords: String,
    pub at_list: Vec<i64>,
    pub total: Option<i64>,
    pub currency: Option<String>,
    pub like_num: i32,
    pub comment_num: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub valid: bool,
    pub publish_time: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    pub user_id: Option<i64>,
    pub at_list: Vec<i64>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub valid: bool,
    pub title: String,
    pub caption_id: Option<i64>,
    pub keywords: String,
    pub content: String,
    pub city_id: Option<i64>,
    pub comment_num: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: i64,
    pub user_id: i64,
    pub site_id: Option<i64>,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    /// Name of the app the content was shared to.
    pub channel: String,
    pub token: String,
    pub action_time: OffsetDateTime,
}

impl ShareRecord {
    /// Grouping key used for per-target share counting.
    pub fn target_group(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        (self.site_id, self.review_id, self.article_id)
    }
}

/// Input for a new or edited review.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDraft {
    pub user_id: i64,
    pub site_id: Option<i64>,
    pub stars: Option<f64>,
    pub content: String,
    pub images: Vec<i64>,
    pub keywords: String,
    pub at_list: Vec<i64>,
    pub total: Option<i64>,
    pub currency: Option<String>,
    pub published: bool,
}

impl ReviewDraft {
    /// Validates the rating and clamps list fields to their limits.
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        if let Some(stars) = self.stars
            && !(1.0..=5.0).contains(&stars)
        {
            return Err(DomainError::validation(format!(
                "stars must lie between 1 and 5, got {stars}"
            )));
        }
        if let Some(total) = self.total
            && total < 0
        {
            return Err(DomainError::validation("total must not be negative"));
        }
        self.content = self.content.trim().to_string();
        self.images = truncate_ids(self.images, IMAGE_LIMIT);
        self.at_list = truncate_ids(self.at_list, AT_LIST_LIMIT);
        self.keywords = truncate_words(&self.keywords, KEYWORD_LIMIT);
        self.currency = self
            .currency
            .map(|currency| currency.trim().to_string())
            .filter(|currency| !currency.is_empty());
        Ok(self)
    }
}

/// Input for a new or edited comment. Exactly one parent must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentDraft {
    pub user_id: i64,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    pub content: String,
    pub at_list: Vec<i64>,
}

impl CommentDraft {
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        match (self.review_id, self.article_id) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(DomainError::validation(
                    "comment must reference exactly one review or article",
                ));
            }
        }
        self.content = self.content.trim().to_string();
        if self.content.is_empty() {
            return Err(DomainError::validation("comment content must not be empty"));
        }
        self.at_list = truncate_ids(self.at_list, AT_LIST_LIMIT);
        Ok(self)
    }
}

/// Input for a share record. Zero or absent targets are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareDraft {
    pub user_id: i64,
    pub site_id: Option<i64>,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    pub channel: String,
}

impl ShareDraft {
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        self.site_id = self.site_id.filter(|id| *id != 0);
        self.review_id = self.review_id.filter(|id| *id != 0);
        self.article_id = self.article_id.filter(|id| *id != 0);
        if self.site_id.is_none() && self.review_id.is_none() && self.article_id.is_none() {
            return Err(DomainError::validation("share must reference a target"));
        }
        self.channel = self.channel.trim().to_string();
        Ok(self)
    }
}

/// Partial update of a user profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfilePatch {
    pub name: Option<String>,
    pub icon_id: Option<Option<i64>>,
    pub gender: Option<Option<String>>,
    pub badges: Option<String>,
}

impl UserProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon_id.is_none() && self.gender.is_none() && self.badges.is_none()
    }

    pub fn apply(self, user: &mut UserRecord) -> Result<(), DomainError> {
        if let Some(name) = self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("user name must not be empty"));
            }
            user.name = name.to_string();
        }
        if let Some(icon_id) = self.icon_id {
            user.icon_id = icon_id;
        }
        if let Some(gender) = self.gender {
            user.gender = gender;
        }
        if let Some(badges) = self.badges {
            user.badges = badges.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        Ok(())
    }
}

/// Keeps the first `limit` distinct ids in their original order.
pub fn truncate_ids(ids: Vec<i64>, limit: usize) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}

/// Keeps the first `limit` whitespace separated words.
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}
