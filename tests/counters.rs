mod support;

use support::{World, review};
use youyou::application::error::StatusClass;
use youyou::application::repos::EntityStore;
use youyou::domain::entities::{ReviewDraft, ShareDraft};
use youyou::domain::snapshots::EntitySnapshot;
use youyou::domain::types::EntityRef;

#[tokio::test]
async fn site_rating_tracks_valid_reviews() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Namtso", None);
    let writes = &world.app.writes;

    writes.create_review(review(ann, site, 3.0)).await.expect("3");
    writes.create_review(review(ann, site, 4.0)).await.expect("4");
    let five = writes.create_review(review(ann, site, 5.0)).await.expect("5");

    let snapshot = world.app.reads.sites(&[site], true).await.expect("site")[0].clone();
    assert_eq!(snapshot.stars, 4.0);
    assert_eq!(snapshot.review_num, 3);

    writes.delete_review(five.id, ann).await.expect("delete");

    let snapshot = world.app.reads.sites(&[site], true).await.expect("site")[0].clone();
    assert_eq!(snapshot.stars, 3.5);
    assert_eq!(snapshot.review_num, 2);

    let author = world.app.reads.users(&[ann], true).await.expect("user")[0].clone();
    assert_eq!(author.review_num, 2);
}

#[tokio::test]
async fn unrated_reviews_count_but_do_not_rate() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Yamdrok", None);

    world
        .app
        .writes
        .create_review(ReviewDraft {
            stars: None,
            ..review(ann, site, 1.0)
        })
        .await
        .expect("unrated");

    let site = world.store.site(site).expect("site");
    assert_eq!(site.review_num, 1);
    assert_eq!(site.stars, 0.0);
}

#[tokio::test]
async fn recompute_is_idempotent() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Ganden", None);
    world
        .app
        .writes
        .create_review(review(ann, site, 2.0))
        .await
        .expect("create");

    let counters = &world.app.counters;
    let first = counters
        .recompute_and_cache(EntityRef::site(site))
        .await
        .expect("first");
    let second = counters
        .recompute_and_cache(EntityRef::site(site))
        .await
        .expect("second");

    assert_eq!(first, second);
    match first {
        Some(EntitySnapshot::Site(site)) => {
            assert_eq!(site.review_num, 1);
            assert_eq!(site.stars, 2.0);
        }
        other => panic!("unexpected snapshot {other:?}"),
    }
}

#[tokio::test]
async fn recompute_of_missing_entity_returns_none() {
    let world = World::new();
    let result = world
        .app
        .counters
        .recompute_and_cache(EntityRef::user(404))
        .await
        .expect("recompute");
    assert!(result.is_none());
}

#[tokio::test]
async fn favorite_then_unfavorite_restores_count() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Drepung", None);
    let other = world.store.add_site("Sera", None);
    let writes = &world.app.writes;

    writes.favorite(ann, other).await.expect("seed favorite");
    let before = world.app.reads.users(&[ann], true).await.expect("user")[0].favorite_num;
    assert_eq!(before, 1);

    assert!(writes.favorite(ann, site).await.expect("favorite"));
    assert!(!writes.favorite(ann, site).await.expect("duplicate favorite"));
    let during = world.app.reads.users(&[ann], true).await.expect("user")[0].favorite_num;
    assert_eq!(during, 2);

    assert!(writes.unfavorite(ann, site).await.expect("unfavorite"));
    assert!(!writes.unfavorite(ann, site).await.expect("absent unfavorite"));
    let after = world.app.reads.users(&[ann], true).await.expect("user")[0].favorite_num;
    assert_eq!(after, before);
}

#[tokio::test]
async fn follow_counters_ignore_invalid_users() {
    let world = World::new();
    let star = world.store.add_user("star");
    let fan = world.store.add_user("fan");
    let ghost = world.store.add_user("ghost");
    let writes = &world.app.writes;

    writes.follow(star, fan).await.expect("follow");
    writes.follow(star, ghost).await.expect("follow");

    let star_snapshot = world.app.reads.users(&[star], true).await.expect("user")[0].clone();
    assert_eq!(star_snapshot.fans_num, 2);
    let fan_snapshot = world.app.reads.users(&[fan], true).await.expect("user")[0].clone();
    assert_eq!(fan_snapshot.follow_num, 1);

    world.store.set_user_valid(ghost, false);
    let refreshed = world
        .app
        .counters
        .recompute_and_cache(EntityRef::user(star))
        .await
        .expect("recompute");
    match refreshed {
        Some(EntitySnapshot::User(user)) => assert_eq!(user.fans_num, 1),
        other => panic!("unexpected snapshot {other:?}"),
    }

    assert!(writes.follow(star, star).await.is_err());
}

#[tokio::test]
async fn likes_follow_review_visibility() {
    let world = World::new();
    let author = world.store.add_user("author");
    let liker = world.store.add_user("liker");
    let site = world.store.add_site("Tashilhunpo", None);
    let writes = &world.app.writes;

    let created = writes
        .create_review(review(author, site, 4.0))
        .await
        .expect("create");
    assert!(writes.like(liker, created.id).await.expect("like"));
    assert!(!writes.like(liker, created.id).await.expect("duplicate like"));

    let liked = world.app.reads.reviews(&[created.id], true).await.expect("review")[0].clone();
    assert_eq!(liked.like_num, 1);
    let liker_snapshot = world.app.reads.users(&[liker], true).await.expect("user")[0].clone();
    assert_eq!(liker_snapshot.like_num, 1);

    writes.delete_review(created.id, author).await.expect("delete");
    let liker_snapshot = world.app.reads.users(&[liker], true).await.expect("user")[0].clone();
    assert_eq!(liker_snapshot.like_num, 0);

    assert!(writes.like(liker, created.id).await.is_err());
}

#[tokio::test]
async fn shares_count_distinct_targets() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Samye", None);
    let article = world.store.add_article("Road trip", "Day one\nDay two");
    let share = |site_id, article_id| ShareDraft {
        user_id: ann,
        site_id,
        review_id: None,
        article_id,
        channel: "wechat".to_string(),
    };
    let writes = &world.app.writes;

    let first = writes.share(share(Some(site), None)).await.expect("share");
    writes.share(share(Some(site), None)).await.expect("share again");
    writes.share(share(None, Some(article))).await.expect("share article");

    assert!(first.url_path.starts_with("/sites/"));
    let user = world.app.reads.users(&[ann], true).await.expect("user")[0].clone();
    assert_eq!(user.share_num, 2);

    let shares = world.app.reads.shares_of(ann).await.expect("shares");
    assert_eq!(shares.len(), 2);
    assert!(shares[0].url_path.starts_with("/articles/"));
}

#[tokio::test]
async fn site_images_count_distinct_ids() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Everest base camp", None);
    let writes = &world.app.writes;

    writes
        .create_review(ReviewDraft {
            images: vec![3, 4],
            ..review(ann, site, 5.0)
        })
        .await
        .expect("published");
    writes
        .create_review(ReviewDraft {
            images: vec![5, 6],
            published: false,
            ..review(ann, site, 5.0)
        })
        .await
        .expect("draft");

    let snapshot = writes
        .update_site_images(site, vec![1, 2], vec![2, 3])
        .await
        .expect("images");
    assert_eq!(snapshot.images_num, 4);
    assert_eq!(snapshot.top_images, vec![1, 2]);
}

#[tokio::test]
async fn comment_counts_follow_parent_moves() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Barkhor", None);
    let article = world.store.add_article("Kora", "Walk clockwise");
    let writes = &world.app.writes;

    let reviewed = writes
        .create_review(review(ann, site, 4.0))
        .await
        .expect("review");
    let comment = writes
        .create_comment(youyou::domain::entities::CommentDraft {
            user_id: ann,
            review_id: Some(reviewed.id),
            article_id: None,
            content: "agreed".to_string(),
            at_list: vec![],
        })
        .await
        .expect("comment");
    assert_eq!(world.store.review(reviewed.id).expect("review").comment_num, 1);

    writes
        .update_comment(
            comment.id,
            youyou::domain::entities::CommentDraft {
                user_id: ann,
                review_id: None,
                article_id: Some(article),
                content: "moved".to_string(),
                at_list: vec![],
            },
        )
        .await
        .expect("move");

    assert_eq!(world.store.review(reviewed.id).expect("review").comment_num, 0);
    assert_eq!(world.store.article(article).expect("article").comment_num, 1);
}

/// Two recounts racing over the same site: last write wins and both write
/// the same value, so the stored counter converges.
#[tokio::test]
async fn concurrent_recounts_converge() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Nam Co", None);
    for stars in [2.0, 4.0] {
        world
            .app
            .writes
            .create_review(review(ann, site, stars))
            .await
            .expect("create");
    }

    let counters = world.app.counters.clone();
    let (left, right) = tokio::join!(
        counters.recompute_and_cache(EntityRef::site(site)),
        counters.recompute_and_cache(EntityRef::site(site)),
    );
    left.expect("left");
    right.expect("right");

    let stored = world.store.site(site).expect("site");
    assert_eq!(stored.review_num, 2);
    assert_eq!(stored.stars, 3.0);
    let stats = world.store.site_review_stats(site).await.expect("stats");
    assert_eq!(stats.review_count, 2);
}

#[tokio::test]
async fn only_the_author_may_delete_a_review() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let bob = world.store.add_user("bob");
    let site = world.store.add_site("Sera", None);
    let writes = &world.app.writes;
    let created = writes.create_review(review(ann, site, 5.0)).await.expect("create");

    let err = writes
        .delete_review(created.id, bob)
        .await
        .expect_err("stranger delete");
    assert_eq!(err.status(), StatusClass::BadRequest);

    let err = writes
        .delete_review(created.id + 1_000, ann)
        .await
        .expect_err("missing review");
    assert_eq!(err.status(), StatusClass::NotFound);

    writes.delete_review(created.id, ann).await.expect("author delete");
    let sites = world.app.reads.sites(&[site], false).await.expect("site");
    assert_eq!(sites[0].review_num, 0);
}
