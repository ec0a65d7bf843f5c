mod support;

use std::sync::Arc;

use sqlx::PgPool;
use support::review;
use youyou::application::context::AppContext;
use youyou::application::repos::EntityStore;
use youyou::cache::{CacheConfig, ListQuery, MemoryCache, ReviewScope};
use youyou::domain::types::{EntityKind, Selection};
use youyou::infra::db::PostgresStore;

async fn seed(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .expect("seed row")
}

fn context(pool: PgPool) -> (Arc<PostgresStore>, AppContext) {
    let config = CacheConfig::default();
    let store = Arc::new(PostgresStore::new(pool));
    let cache = Arc::new(MemoryCache::new(&config));
    let app = AppContext::new(store.clone(), cache, config);
    (store, app)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn review_writes_update_site_counters(pool: PgPool) {
    let ann = seed(&pool, "INSERT INTO users (name) VALUES ('ann') RETURNING id").await;
    let site = seed(&pool, "INSERT INTO sites (name) VALUES ('Potala') RETURNING id").await;
    let (store, app) = context(pool.clone());

    for stars in [3.0, 4.0, 5.0] {
        app.writes
            .create_review(review(ann, site, stars))
            .await
            .expect("create review");
    }

    let (stars, review_num): (f64, i32) =
        sqlx::query_as("SELECT stars, review_num FROM sites WHERE id = $1")
            .bind(site)
            .fetch_one(&pool)
            .await
            .expect("site counters");
    assert_eq!(stars, 4.0);
    assert_eq!(review_num, 3);

    let ids = store
        .list_ids(&ListQuery::reviews(
            ReviewScope::Site(site),
            Selection::Any,
            true,
        ))
        .await
        .expect("list ids");
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_relations_are_no_ops(pool: PgPool) {
    let star = seed(&pool, "INSERT INTO users (name) VALUES ('star') RETURNING id").await;
    let fan = seed(&pool, "INSERT INTO users (name) VALUES ('fan') RETURNING id").await;
    let (store, app) = context(pool);

    assert!(app.writes.follow(star, fan).await.expect("follow"));
    assert!(!app.writes.follow(star, fan).await.expect("follow again"));
    assert!(store.is_following(star, fan).await.expect("is following"));
    assert_eq!(store.fans_count(star).await.expect("fans"), 1);

    assert!(app.writes.unfollow(star, fan).await.expect("unfollow"));
    assert!(!app.writes.unfollow(star, fan).await.expect("unfollow again"));
    assert_eq!(store.fans_count(star).await.expect("fans"), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn batched_fetch_skips_missing_ids(pool: PgPool) {
    let ann = seed(&pool, "INSERT INTO users (name) VALUES ('ann') RETURNING id").await;
    let (store, _) = context(pool);

    let users = store.fetch_users(&[ann, ann + 1000]).await.expect("fetch");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "ann");

    let every = store.entity_ids(EntityKind::User).await.expect("ids");
    assert_eq!(every, vec![ann]);
}
