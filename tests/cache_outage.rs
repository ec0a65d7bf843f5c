mod support;

use support::{World, review};
use youyou::cache::ReviewScope;
use youyou::domain::types::Selection;

#[tokio::test]
async fn writes_and_reads_survive_a_dead_cache() {
    let world = World::unreachable_cache();
    let ann = world.store.add_user("ann");
    let bob = world.store.add_user("bob");
    let site = world.store.add_site("Yumbulagang", None);
    let writes = &world.app.writes;
    let reads = &world.app.reads;

    let created = writes
        .create_review(review(ann, site, 4.0))
        .await
        .expect("create");
    assert!(writes.like(bob, created.id).await.expect("like"));
    assert!(writes.follow(ann, bob).await.expect("follow"));

    let site_snapshot = reads.sites(&[site], true).await.expect("site")[0].clone();
    assert_eq!(site_snapshot.review_num, 1);
    assert_eq!(site_snapshot.stars, 4.0);

    let author = reads.users(&[ann], true).await.expect("author")[0].clone();
    assert_eq!(author.review_num, 1);
    assert_eq!(author.fans_num, 1);

    let listed = reads
        .review_list(ReviewScope::Site(site), Selection::Any, true)
        .await
        .expect("list");
    assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![created.id]);
    assert_eq!(listed[0].like_num, 1);

    assert_eq!(reads.liked_reviews(bob).await.expect("liked").len(), 1);
    assert!(world.cache.is_empty());
}

#[tokio::test]
async fn every_read_goes_to_the_store_without_a_cache() {
    let world = World::unreachable_cache();
    let ann = world.store.add_user("ann");

    world.app.reads.users(&[ann], true).await.expect("first");
    let after_first = world.store.fetch_count();
    world.app.reads.users(&[ann], true).await.expect("second");

    assert!(world.store.fetch_count() > after_first);
}

#[tokio::test]
async fn failed_store_write_surfaces_as_error() {
    let world = World::unreachable_cache();
    let ann = world.store.add_user("ann");
    let site = world.store.add_site("Drak Yerpa", None);

    world.store.fail_writes(true);
    let result = world.app.writes.create_review(review(ann, site, 3.0)).await;
    assert!(result.is_err());

    world.store.fail_writes(false);
    assert_eq!(world.store.site(site).expect("site").review_num, 0);
}
