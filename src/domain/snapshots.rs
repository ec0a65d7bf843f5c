//! Immutable entity snapshots served to readers.
//!
//! Every snapshot is produced by a pure format function from its record, so a
//! snapshot read from the cache and one formatted from a fresh store row are
//! indistinguishable.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::domain::{
    entities::{ArticleRecord, CommentRecord, ReviewRecord, ShareRecord, SiteRecord, UserRecord},
    types::EntityKind,
};

/// Length of review briefs and article previews, in characters.
pub const BRIEF_CHARS: usize = 80;
/// Currency assumed when a review does not name one.
pub const DEFAULT_CURRENCY: &str = "人民币";

pub trait Snapshot: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Record: Send + Sync;

    const KIND: EntityKind;

    /// Identifier of the entity the snapshot describes.
    fn id(&self) -> i64;

    /// Whether the underlying entity is visible to ordinary readers.
    fn is_valid(&self) -> bool;

    fn record_id(record: &Self::Record) -> i64;

    /// Produce the snapshot for a record.
    fn format(record: &Self::Record) -> Self;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i64,
    pub valid: bool,
    pub anonymous: bool,
    pub name: String,
    pub icon_image_id: i64,
    pub gender: Option<String>,
    pub level: i32,
    pub badges: Vec<String>,
    pub follow_num: i32,
    pub fans_num: i32,
    pub like_num: i32,
    pub share_num: i32,
    pub review_num: i32,
    pub favorite_num: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub fn format_user(record: &UserRecord) -> UserSnapshot {
    UserSnapshot {
        id: record.id,
        valid: record.valid,
        anonymous: record.anonymous,
        name: record.name.clone(),
        icon_image_id: record.icon_id.unwrap_or(0),
        gender: record.gender.clone(),
        level: record.level,
        badges: words(&record.badges),
        follow_num: record.follow_num,
        fans_num: record.fans_num,
        like_num: record.like_num,
        share_num: record.share_num,
        review_num: record.review_num,
        favorite_num: record.favorite_num,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub id: i64,
    pub valid: bool,
    pub name: String,
    pub name_orig: String,
    pub city_id: Option<i64>,
    pub city_name: String,
    pub logo_image_id: i64,
    pub level: String,
    pub stars: f64,
    pub review_num: i32,
    pub images_num: i32,
    pub address: String,
    pub keywords: Vec<String>,
    pub top_images: Vec<i64>,
    pub gate_images: Vec<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub updated_at: OffsetDateTime,
}

pub fn format_site(record: &SiteRecord) -> SiteSnapshot {
    SiteSnapshot {
        id: record.id,
        valid: record.valid,
        name: record.name.clone(),
        name_orig: record.name_orig.clone(),
        city_id: record.city_id,
        city_name: record.city_name.clone().unwrap_or_default(),
        logo_image_id: record.logo_id.unwrap_or(0),
        level: record.level.clone(),
        stars: record.stars,
        review_num: record.review_num,
        images_num: record.images_num,
        address: record.address.clone(),
        keywords: words(&record.keywords),
        top_images: record.top_images.clone(),
        gate_images: record.gate_images.clone(),
        longitude: record.longitude,
        latitude: record.latitude,
        updated_at: record.updated_at,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    pub id: i64,
    pub valid: bool,
    pub published: bool,
    pub selected: bool,
    pub publish_time: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
    pub user_id: Option<i64>,
    pub site_id: Option<i64>,
    pub city_id: Option<i64>,
    pub stars: Option<f64>,
    pub content: String,
    pub brief_content: String,
    pub images: Vec<i64>,
    pub images_num: usize,
    pub keywords: Vec<String>,
    pub at_users: Vec<i64>,
    pub total: Option<i64>,
    pub currency: String,
    pub like_num: i32,
    pub comment_num: i32,
}

pub fn format_review(record: &ReviewRecord) -> ReviewSnapshot {
    let content = record.content.trim().to_string();
    ReviewSnapshot {
        id: record.id,
        valid: record.valid,
        published: record.published,
        selected: record.selected,
        publish_time: record.publish_time,
        updated_at: record.updated_at,
        user_id: record.user_id,
        site_id: record.site_id,
        city_id: record.city_id,
        stars: record.stars,
        brief_content: prefix_chars(&content, BRIEF_CHARS),
        content,
        images: record.images.clone(),
        images_num: record.images.len(),
        keywords: words(&record.keywords),
        at_users: record.at_list.clone(),
        total: record.total,
        currency: record
            .currency
            .clone()
            .filter(|currency| !currency.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        like_num: record.like_num,
        comment_num: record.comment_num,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentSnapshot {
    pub id: i64,
    pub valid: bool,
    pub publish_time: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    pub user_id: Option<i64>,
    pub at_users: Vec<i64>,
    pub content: String,
}

pub fn format_comment(record: &CommentRecord) -> CommentSnapshot {
    CommentSnapshot {
        id: record.id,
        valid: record.valid,
        publish_time: record.publish_time,
        updated_at: record.updated_at,
        review_id: record.review_id,
        article_id: record.article_id,
        user_id: record.user_id,
        at_users: record.at_list.clone(),
        content: record.content.trim().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSnapshot {
    pub id: i64,
    pub valid: bool,
    pub title: String,
    pub caption_image_id: i64,
    pub keywords: Vec<String>,
    pub content: String,
    pub preview: String,
    pub city_id: Option<i64>,
    pub comment_num: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub fn format_article(record: &ArticleRecord) -> ArticleSnapshot {
    let preview = record
        .content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| prefix_chars(line, BRIEF_CHARS))
        .unwrap_or_default();
    ArticleSnapshot {
        id: record.id,
        valid: record.valid,
        title: record.title.clone(),
        caption_image_id: record.caption_id.unwrap_or(0),
        keywords: words(&record.keywords),
        content: record.content.clone(),
        preview,
        city_id: record.city_id,
        comment_num: record.comment_num,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// What a share points at. Articles win over sites, sites over reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ShareTarget {
    Article(i64),
    Site(i64),
    Review(i64),
}

impl ShareTarget {
    pub fn of(record: &ShareRecord) -> Option<Self> {
        record
            .article_id
            .map(ShareTarget::Article)
            .or(record.site_id.map(ShareTarget::Site))
            .or(record.review_id.map(ShareTarget::Review))
    }

    pub fn url_path(self, token: &str) -> String {
        match self {
            ShareTarget::Article(_) => format!("/articles/{token}"),
            ShareTarget::Site(_) => format!("/sites/{token}"),
            ShareTarget::Review(_) => format!("/reviews/{token}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub target: Option<ShareTarget>,
    pub site_id: Option<i64>,
    pub review_id: Option<i64>,
    pub article_id: Option<i64>,
    pub channel: String,
    pub token: String,
    pub url_path: String,
    pub action_time: OffsetDateTime,
}

pub fn format_share(record: &ShareRecord) -> ShareSnapshot {
    let target = ShareTarget::of(record);
    ShareSnapshot {
        id: record.id,
        user_id: record.user_id,
        target,
        site_id: record.site_id,
        review_id: record.review_id,
        article_id: record.article_id,
        channel: record.channel.clone(),
        token: record.token.clone(),
        url_path: target
            .map(|target| target.url_path(&record.token))
            .unwrap_or_default(),
        action_time: record.action_time,
    }
}

/// A snapshot of any kind, as returned by maintenance operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "snapshot", rename_all = "snake_case")]
pub enum EntitySnapshot {
    User(UserSnapshot),
    Site(SiteSnapshot),
    Review(ReviewSnapshot),
    Comment(CommentSnapshot),
    Article(ArticleSnapshot),
    Share(ShareSnapshot),
}

impl EntitySnapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySnapshot::User(_) => EntityKind::User,
            EntitySnapshot::Site(_) => EntityKind::Site,
            EntitySnapshot::Review(_) => EntityKind::Review,
            EntitySnapshot::Comment(_) => EntityKind::Comment,
            EntitySnapshot::Article(_) => EntityKind::Article,
            EntitySnapshot::Share(_) => EntityKind::Share,
        }
    }
}

macro_rules! impl_snapshot {
    ($snapshot:ty, $record:ty, $kind:expr, $format:path, |$s:ident| $valid:expr) => {
        impl Snapshot for $snapshot {
            type Record = $record;

            const KIND: EntityKind = $kind;

            fn id(&self) -> i64 {
                self.id
            }

            fn is_valid(&self) -> bool {
                let $s = self;
                $valid
            }

            fn record_id(record: &Self::Record) -> i64 {
                record.id
            }

            fn format(record: &Self::Record) -> Self {
                $format(record)
            }
        }
    };
}

impl_snapshot!(UserSnapshot, UserRecord, EntityKind::User, format_user, |s| s.valid);
impl_snapshot!(SiteSnapshot, SiteRecord, EntityKind::Site, format_site, |s| s.valid);
impl_snapshot!(ReviewSnapshot, ReviewRecord, EntityKind::Review, format_review, |s| s.valid);
impl_snapshot!(CommentSnapshot, CommentRecord, EntityKind::Comment, format_comment, |s| s.valid);
impl_snapshot!(ArticleSnapshot, ArticleRecord, EntityKind::Article, format_article, |s| s.valid);
impl_snapshot!(ShareSnapshot, ShareRecord, EntityKind::Share, format_share, |_s| true);

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn prefix_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
