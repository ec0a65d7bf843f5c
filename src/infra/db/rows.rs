//! Row types and the column lists that produce them.

use time::OffsetDateTime;

use crate::domain::entities::{
    ArticleRecord, CommentRecord, ReviewRecord, ShareRecord, SiteRecord, UserRecord,
};

pub(super) const USER_COLUMNS: &str = "u.id, u.valid, u.anonymous, u.name, u.icon_id, u.gender, \
    u.level, u.badges, u.follow_num, u.fans_num, u.like_num, u.share_num, u.review_num, \
    u.favorite_num, u.created_at, u.updated_at";

pub(super) const SITE_COLUMNS: &str = "s.id, s.valid, s.name, s.name_orig, s.city_id, \
    c.name AS city_name, s.logo_id, s.level, s.stars, s.review_num, s.images_num, s.address, \
    s.keywords, s.top_images, s.gate_images, s.longitude, s.latitude, s.updated_at";

pub(super) const REVIEW_COLUMNS: &str = "r.id, r.valid, r.published, r.selected, r.publish_time, \
    r.updated_at, r.user_id, r.site_id, s.city_id, r.stars, r.content, r.images, r.keywords, \
    r.at_list, r.total, r.currency, r.like_num, r.comment_num";

pub(super) const COMMENT_COLUMNS: &str = "m.id, m.valid, m.publish_time, m.updated_at, \
    m.review_id, m.article_id, m.user_id, m.at_list, m.content";

pub(super) const ARTICLE_COLUMNS: &str = "a.id, a.valid, a.title, a.caption_id, a.keywords, \
    a.content, a.city_id, a.comment_num, a.created_at, a.updated_at";

pub(super) const SHARE_COLUMNS: &str = "id, user_id, site_id, review_id, article_id, channel, \
    token, action_time";

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: i64,
    valid: bool,
    anonymous: bool,
    name: String,
    icon_id: Option<i64>,
    gender: Option<String>,
    level: i32,
    badges: String,
    follow_num: i32,
    fans_num: i32,
    like_num: i32,
    share_num: i32,
    review_num: i32,
    favorite_num: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            valid: row.valid,
            anonymous: row.anonymous,
            name: row.name,
            icon_id: row.icon_id,
            gender: row.gender,
            level: row.level,
            badges: row.badges,
            follow_num: row.follow_num,
            fans_num: row.fans_num,
            like_num: row.like_num,
            share_num: row.share_num,
            review_num: row.review_num,
            favorite_num: row.favorite_num,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct SiteRow {
    id: i64,
    valid: bool,
    name: String,
    name_orig: String,
    city_id: Option<i64>,
    city_name: Option<String>,
    logo_id: Option<i64>,
    level: String,
    stars: f64,
    review_num: i32,
    images_num: i32,
    address: String,
    keywords: String,
    top_images: Vec<i64>,
    gate_images: Vec<i64>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    updated_at: OffsetDateTime,
}

impl From<SiteRow> for SiteRecord {
    fn from(row: SiteRow) -> Self {
        Self {
            id: row.id,
            valid: row.valid,
            name: row.name,
            name_orig: row.name_orig,
            city_id: row.city_id,
            city_name: row.city_name,
            logo_id: row.logo_id,
            level: row.level,
            stars: row.stars,
            review_num: row.review_num,
            images_num: row.images_num,
            address: row.address,
            keywords: row.keywords,
            top_images: row.top_images,
            gate_images: row.gate_images,
            longitude: row.longitude,
            latitude: row.latitude,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ReviewRow {
    id: i64,
    valid: bool,
    published: bool,
    selected: bool,
    publish_time: Option<OffsetDateTime>,
    updated_at: OffsetDateTime,
    user_id: Option<i64>,
    site_id: Option<i64>,
    city_id: Option<i64>,
    stars: Option<f64>,
    content: String,
    images: Vec<i64>,
    keywords: String,
    at_list: Vec<i64>,
    total: Option<i64>,
    currency: Option<String>,
    like_num: i32,
    comment_num: i32,
}

impl From<ReviewRow> for ReviewRecord {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            valid: row.valid,
            published: row.published,
            selected: row.selected,
            publish_time: row.publish_time,
            updated_at: row.updated_at,
            user_id: row.user_id,
            site_id: row.site_id,
            city_id: row.city_id,
            stars: row.stars,
            content: row.content,
            images: row.images,
            keywords: row.keywords,
            at_list: row.at_list,
            total: row.total,
            currency: row.currency,
            like_num: row.like_num,
            comment_num: row.comment_num,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct CommentRow {
    id: i64,
    valid: bool,
    publish_time: OffsetDateTime,
    updated_at: OffsetDateTime,
    review_id: Option<i64>,
    article_id: Option<i64>,
    user_id: Option<i64>,
    at_list: Vec<i64>,
    content: String,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            valid: row.valid,
            publish_time: row.publish_time,
            updated_at: row.updated_at,
            review_id: row.review_id,
            article_id: row.article_id,
            user_id: row.user_id,
            at_list: row.at_list,
            content: row.content,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ArticleRow {
    id: i64,
    valid: bool,
    title: String,
    caption_id: Option<i64>,
    keywords: String,
    content: String,
    city_id: Option<i64>,
    comment_num: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            valid: row.valid,
            title: row.title,
            caption_id: row.caption_id,
            keywords: row.keywords,
            content: row.content,
            city_id: row.city_id,
            comment_num: row.comment_num,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ShareRow {
    id: i64,
    user_id: i64,
    site_id: Option<i64>,
    review_id: Option<i64>,
    article_id: Option<i64>,
    channel: String,
    token: String,
    action_time: OffsetDateTime,
}

impl From<ShareRow> for ShareRecord {
    fn from(row: ShareRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            site_id: row.site_id,
            review_id: row.review_id,
            article_id: row.article_id,
            channel: row.channel,
            token: row.token,
            action_time: row.action_time,
        }
    }
}
