mod support;

use support::{World, review};
use youyou::application::repos::EntityStore;
use youyou::cache::{CacheConfig, CommentScope, ReviewScope};
use youyou::domain::entities::{CommentDraft, ReviewDraft};
use youyou::domain::types::Selection;

#[tokio::test]
async fn new_review_appears_in_cached_site_list() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Potala", None);
    let reads = &world.app.reads;

    let primed = reads
        .review_list(ReviewScope::Site(site), Selection::Any, true)
        .await
        .expect("prime");
    assert!(primed.is_empty());

    let created = world
        .app
        .writes
        .create_review(review(ann, site, 5.0))
        .await
        .expect("create");
    assert!(!created.selected);

    let listed = reads
        .review_list(ReviewScope::Site(site), Selection::Any, true)
        .await
        .expect("list");
    assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![created.id]);

    let by_author = reads
        .review_list(ReviewScope::User(ann), Selection::Unselected, false)
        .await
        .expect("author list");
    assert_eq!(by_author.len(), 1);
}

#[tokio::test]
async fn moved_review_leaves_old_site_list() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let old_site = world.store.add_site("Sera", None);
    let new_site = world.store.add_site("Drepung", None);
    let reads = &world.app.reads;

    let created = world
        .app
        .writes
        .create_review(review(ann, old_site, 3.0))
        .await
        .expect("create");
    for site in [old_site, new_site] {
        reads
            .review_list(ReviewScope::Site(site), Selection::Any, false)
            .await
            .expect("prime");
    }

    world
        .app
        .writes
        .update_review(created.id, review(ann, new_site, 3.0))
        .await
        .expect("move");

    let old_list = reads
        .review_list(ReviewScope::Site(old_site), Selection::Any, false)
        .await
        .expect("old");
    let new_list = reads
        .review_list(ReviewScope::Site(new_site), Selection::Any, false)
        .await
        .expect("new");
    assert!(old_list.is_empty());
    assert_eq!(new_list.len(), 1);

    assert_eq!(world.store.site(old_site).expect("old").review_num, 0);
    assert_eq!(world.store.site(new_site).expect("new").review_num, 1);
}

#[tokio::test]
async fn publishing_reaches_the_city_feed() {
    let world = World::new();
    let city = world.store.add_city("Lhasa");
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Norbulingka", Some(city));
    let reads = &world.app.reads;

    let draft = world
        .app
        .writes
        .create_review(ReviewDraft {
            images: vec![11],
            published: false,
            ..review(ann, site, 4.0)
        })
        .await
        .expect("draft");
    assert!(draft.publish_time.is_none());
    assert!(
        reads
            .review_list(ReviewScope::City(city), Selection::Any, true)
            .await
            .expect("prime")
            .is_empty()
    );

    let published = world
        .app
        .writes
        .update_review(
            draft.id,
            ReviewDraft {
                images: vec![11],
                ..review(ann, site, 4.0)
            },
        )
        .await
        .expect("publish");
    assert!(published.publish_time.is_some());
    assert_eq!(published.city_id, Some(city));

    let feed = reads
        .review_list(ReviewScope::City(city), Selection::Any, true)
        .await
        .expect("feed");
    assert_eq!(feed.len(), 1);
}

#[tokio::test]
async fn follow_lists_track_relations() {
    let world = World::new();
    let star = world.store.add_user("star");
    let fan = world.store.add_user("fan");
    let reads = &world.app.reads;

    assert!(reads.fans_of(star).await.expect("prime").is_empty());
    assert!(reads.follows_of(fan).await.expect("prime").is_empty());

    world.app.writes.follow(star, fan).await.expect("follow");
    assert_eq!(reads.fans_of(star).await.expect("fans")[0].id, fan);
    assert_eq!(reads.follows_of(fan).await.expect("follows")[0].id, star);
    assert!(reads.is_following(star, fan).await.expect("is following"));

    world.app.writes.unfollow(star, fan).await.expect("unfollow");
    assert!(reads.fans_of(star).await.expect("fans").is_empty());
    assert!(!reads.is_following(star, fan).await.expect("is following"));
}

#[tokio::test]
async fn follow_check_reads_the_store_directly() {
    let world = World::new();
    let star = world.store.add_user("star");
    let fan = world.store.add_user("fan");
    let reads = &world.app.reads;

    assert!(!reads.is_following(star, fan).await.expect("is following"));
    assert!(world.cache.is_empty());

    world.store.add_follow(star, fan).await.expect("add follow");
    assert!(reads.is_following(star, fan).await.expect("is following"));
    assert!(world.cache.is_empty());
}

#[tokio::test]
async fn comment_lists_track_writes() {
    let world = World::new();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Ramoche", None);
    let reads = &world.app.reads;
    let writes = &world.app.writes;

    let reviewed = writes
        .create_review(review(ann, site, 4.0))
        .await
        .expect("review");
    let scope = CommentScope::Review(reviewed.id);
    assert!(reads.comments_for(scope).await.expect("prime").is_empty());

    let comment = writes
        .create_comment(CommentDraft {
            user_id: ann,
            review_id: Some(reviewed.id),
            article_id: None,
            content: "  lovely  ".to_string(),
            at_list: vec![],
        })
        .await
        .expect("comment");
    let listed = reads.comments_for(scope).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "lovely");

    writes
        .delete_comment(comment.id, ann)
        .await
        .expect("delete");
    assert!(reads.comments_for(scope).await.expect("list").is_empty());
    assert_eq!(
        reads.reviews(&[reviewed.id], true).await.expect("review")[0].comment_num,
        0
    );
}

#[tokio::test]
async fn liked_and_favorite_lists_follow_visibility() {
    let world = World::new();
    let author = world.store.add_user("author");
    let fan = world.store.add_user("fan");
    let site = world.store.add_site("Chimpu", None);
    let reads = &world.app.reads;
    let writes = &world.app.writes;

    let created = writes
        .create_review(review(author, site, 5.0))
        .await
        .expect("review");
    writes.like(fan, created.id).await.expect("like");
    writes.favorite(fan, site).await.expect("favorite");

    assert_eq!(reads.liked_reviews(fan).await.expect("liked").len(), 1);
    assert_eq!(reads.favorite_sites(fan).await.expect("favorites").len(), 1);

    writes
        .update_review(
            created.id,
            ReviewDraft {
                published: false,
                ..review(author, site, 5.0)
            },
        )
        .await
        .expect("unpublish");
    assert!(reads.liked_reviews(fan).await.expect("liked").is_empty());
}

#[tokio::test]
async fn disabled_cache_still_maintains_counters() {
    let world = World::with_config(CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    });
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Reting", None);

    world
        .app
        .writes
        .create_review(review(ann, site, 2.0))
        .await
        .expect("create");

    assert!(world.cache.is_empty());
    assert_eq!(world.store.site(site).expect("site").review_num, 1);
    let listed = world
        .app
        .reads
        .review_list(ReviewScope::Site(site), Selection::Any, true)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].site_id, Some(site));
}
