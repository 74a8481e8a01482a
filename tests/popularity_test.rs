//! Popularity ranking and batch annotation tests

mod common;

use blog::error::is_unique_violation;
use blog::orm::comments;
use blog::post::PostRepository;
use blog::tag::TagRepository;
use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*, PaginatorTrait};

#[actix_rt::test]
async fn test_popular_tags_rank_unused_tags_last() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();

    let unused = create_test_tag(&db, "unused").await.unwrap();
    let busy = create_test_tag(&db, "busy").await.unwrap();
    let quiet = create_test_tag(&db, "quiet").await.unwrap();

    let first = create_test_post(&db, author.id, "first", 1).await.unwrap();
    let second = create_test_post(&db, author.id, "second", 2).await.unwrap();
    tag_post(&db, first.id, busy.id).await.unwrap();
    tag_post(&db, second.id, busy.id).await.unwrap();
    tag_post(&db, second.id, quiet.id).await.unwrap();

    let tags = TagRepository::new(&db).popular(10).await.unwrap();

    let ranked: Vec<(&str, Option<i64>)> = tags
        .iter()
        .map(|tag| (tag.title.as_str(), tag.posts_count))
        .collect();
    assert_eq!(
        ranked,
        vec![("busy", Some(2)), ("quiet", Some(1)), ("unused", Some(0))]
    );
    assert_eq!(tags[2].id, unused.id);
}

#[actix_rt::test]
async fn test_popular_tags_empty_store() {
    let db = setup_test_database().await.expect("Failed to setup test database");

    let tags = TagRepository::new(&db).popular(5).await.unwrap();

    assert!(tags.is_empty(), "No tags should yield an empty list, not an error");
}

#[actix_rt::test]
async fn test_popular_tags_respects_limit() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    for n in 0..7 {
        create_test_tag(&db, &format!("tag{}", n)).await.unwrap();
    }

    let tags = TagRepository::new(&db).popular(5).await.unwrap();

    assert_eq!(tags.len(), 5);
}

#[actix_rt::test]
async fn test_popular_posts_ordered_by_likes() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let readers = create_test_readers(&db, "reader", 3).await.unwrap();

    let unliked = create_test_post(&db, author.id, "unliked", 3).await.unwrap();
    let loved = create_test_post(&db, author.id, "loved", 1).await.unwrap();
    let liked = create_test_post(&db, author.id, "liked", 2).await.unwrap();
    for reader in &readers {
        like_post(&db, loved.id, reader.id).await.unwrap();
    }
    like_post(&db, liked.id, readers[0].id).await.unwrap();

    let posts = PostRepository::new(&db).popular(10).await.unwrap();

    let ids: Vec<i32> = posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![loved.id, liked.id, unliked.id]);
    let likes: Vec<i64> = posts.iter().map(|post| post.likes_count).collect();
    assert_eq!(likes, vec![3, 1, 0]);
    assert_eq!(posts[0].author, "editor");
}

#[actix_rt::test]
async fn test_comment_count_is_zero_without_comments() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    create_test_post(&db, author.id, "silent", 1).await.unwrap();

    let repo = PostRepository::new(&db);
    let cards = repo.cards(repo.recent(5).await.unwrap()).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].comments_count, Some(0));
}

#[actix_rt::test]
async fn test_batched_comment_counts_match_individual_counts() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let reader = create_test_user(&db, "reader", false).await.unwrap();

    let mut minute = 100;
    for (n, comment_count) in [0, 1, 3, 2].iter().enumerate() {
        let post = create_test_post(&db, author.id, &format!("post-{}", n), n as i64)
            .await
            .unwrap();
        for _ in 0..*comment_count {
            minute += 1;
            create_test_comment(&db, post.id, reader.id, "hi", minute)
                .await
                .unwrap();
        }
    }

    let repo = PostRepository::new(&db);
    let cards = repo
        .with_comments_count(repo.with_tags(repo.recent(10).await.unwrap()).await.unwrap())
        .await
        .unwrap();
    assert_eq!(cards.len(), 4);

    for card in &cards {
        let individual = comments::Entity::find()
            .filter(comments::Column::PostId.eq(card.post.id))
            .count(&db)
            .await
            .unwrap() as i64;
        assert_eq!(
            card.comments_count,
            Some(individual),
            "Batched count for {} should match its individual count",
            card.post.slug
        );
    }
}

#[actix_rt::test]
async fn test_comment_counts_preserve_input_order() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let reader = create_test_user(&db, "reader", false).await.unwrap();

    let old = create_test_post(&db, author.id, "old", 1).await.unwrap();
    let new = create_test_post(&db, author.id, "new", 2).await.unwrap();
    create_test_comment(&db, old.id, reader.id, "first!", 5)
        .await
        .unwrap();
    create_test_comment(&db, old.id, reader.id, "second", 6)
        .await
        .unwrap();

    let repo = PostRepository::new(&db);
    let cards = repo.cards(repo.recent(5).await.unwrap()).await.unwrap();

    let order: Vec<(i32, Option<i64>)> = cards
        .iter()
        .map(|card| (card.post.id, card.comments_count))
        .collect();
    assert_eq!(order, vec![(new.id, Some(0)), (old.id, Some(2))]);
}

#[actix_rt::test]
async fn test_tag_prefetch_sorted_by_popularity() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();

    let rare = create_test_tag(&db, "rare").await.unwrap();
    let common = create_test_tag(&db, "common").await.unwrap();
    let middle = create_test_tag(&db, "middle").await.unwrap();

    let target = create_test_post(&db, author.id, "target", 10).await.unwrap();
    tag_post(&db, target.id, rare.id).await.unwrap();
    tag_post(&db, target.id, common.id).await.unwrap();
    tag_post(&db, target.id, middle.id).await.unwrap();

    for n in 0..2 {
        let other = create_test_post(&db, author.id, &format!("other-{}", n), n)
            .await
            .unwrap();
        tag_post(&db, other.id, common.id).await.unwrap();
        if n == 0 {
            tag_post(&db, other.id, middle.id).await.unwrap();
        }
    }

    let tags = TagRepository::new(&db)
        .popular_for_posts(&[target.id])
        .await
        .unwrap();

    let titles: Vec<(&str, Option<i64>)> = tags[&target.id]
        .iter()
        .map(|tag| (tag.title.as_str(), tag.posts_count))
        .collect();
    assert_eq!(
        titles,
        vec![("common", Some(3)), ("middle", Some(2)), ("rare", Some(1))]
    );
}

#[actix_rt::test]
async fn test_tag_prefetch_post_without_tags() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let bare = create_test_post(&db, author.id, "bare", 1).await.unwrap();

    let repo = PostRepository::new(&db);
    let cards = repo.with_tags(repo.recent(5).await.unwrap()).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].post.id, bare.id);
    assert!(cards[0].tags.is_empty());
    assert!(cards[0].first_tag().is_none());
    assert_eq!(cards[0].comments_count, None);
}

#[actix_rt::test]
async fn test_tag_prefetch_empty_batch() {
    let db = setup_test_database().await.expect("Failed to setup test database");

    let tags = TagRepository::new(&db).popular_for_posts(&[]).await.unwrap();

    assert!(tags.is_empty());
}

#[actix_rt::test]
async fn test_popular_posts_ties_newest_then_highest_id() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let reader = create_test_user(&db, "reader", false).await.unwrap();

    let older = create_test_post(&db, author.id, "older", 1).await.unwrap();
    let same_a = create_test_post(&db, author.id, "same-a", 5).await.unwrap();
    let same_b = create_test_post(&db, author.id, "same-b", 5).await.unwrap();
    let liked = create_test_post(&db, author.id, "liked", 0).await.unwrap();
    like_post(&db, liked.id, reader.id).await.unwrap();

    let posts = PostRepository::new(&db).popular(10).await.unwrap();

    let ids: Vec<i32> = posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![liked.id, same_b.id, same_a.id, older.id]);

    let likes: Vec<i64> = posts.iter().map(|post| post.likes_count).collect();
    assert!(likes.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[actix_rt::test]
async fn test_duplicate_like_and_tag_link_rejected() {
    let db = setup_test_database().await.expect("Failed to setup test database");
    let author = create_test_user(&db, "editor", true).await.unwrap();
    let reader = create_test_user(&db, "reader", false).await.unwrap();
    let tag = create_test_tag(&db, "rust").await.unwrap();
    let post = create_test_post(&db, author.id, "once", 1).await.unwrap();

    like_post(&db, post.id, reader.id).await.unwrap();
    tag_post(&db, post.id, tag.id).await.unwrap();

    let like_err = like_post(&db, post.id, reader.id)
        .await
        .expect_err("Second like by the same user should be rejected");
    assert!(is_unique_violation(&like_err), "Unexpected error: {}", like_err);

    let link_err = tag_post(&db, post.id, tag.id)
        .await
        .expect_err("Second link to the same tag should be rejected");
    assert!(is_unique_violation(&link_err), "Unexpected error: {}", link_err);

    let posts = PostRepository::new(&db).popular(5).await.unwrap();
    assert_eq!(posts[0].likes_count, 1);

    let tags = TagRepository::new(&db).popular(5).await.unwrap();
    assert_eq!(tags[0].posts_count, Some(1));
}
