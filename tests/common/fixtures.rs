//! Test fixtures for creating test data
#![allow(dead_code)]

use blog::orm::{comments, post_likes, post_tags, posts, tags, users};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

/// A fixed point in time plus `minutes`, so ordering in tests is explicit.
pub fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(minutes)
}

pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    is_staff: bool,
) -> Result<users::Model, DbErr> {
    users::ActiveModel {
        username: Set(username.to_owned()),
        is_staff: Set(is_staff),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn create_test_tag(db: &DatabaseConnection, title: &str) -> Result<tags::Model, DbErr> {
    tags::ActiveModel {
        title: Set(title.to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Post titled after its slug, published `minutes` after the fixed epoch.
pub async fn create_test_post(
    db: &DatabaseConnection,
    author_id: i32,
    slug: &str,
    minutes: i64,
) -> Result<posts::Model, DbErr> {
    posts::ActiveModel {
        title: Set(format!("Title {}", slug)),
        text: Set(format!("Body of {}", slug)),
        slug: Set(slug.to_owned()),
        image: Set(None),
        published_at: Set(at(minutes)),
        author_id: Set(author_id),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn tag_post(db: &DatabaseConnection, post_id: i32, tag_id: i32) -> Result<(), DbErr> {
    post_tags::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(tag_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn like_post(db: &DatabaseConnection, post_id: i32, user_id: i32) -> Result<(), DbErr> {
    post_likes::ActiveModel {
        post_id: Set(post_id),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn create_test_comment(
    db: &DatabaseConnection,
    post_id: i32,
    author_id: i32,
    text: &str,
    minutes: i64,
) -> Result<comments::Model, DbErr> {
    comments::ActiveModel {
        post_id: Set(post_id),
        author_id: Set(author_id),
        text: Set(text.to_owned()),
        published_at: Set(at(minutes)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Creates `count` non-staff users named `{prefix}{n}`.
pub async fn create_test_readers(
    db: &DatabaseConnection,
    prefix: &str,
    count: usize,
) -> Result<Vec<users::Model>, DbErr> {
    let mut readers = Vec::with_capacity(count);
    for n in 0..count {
        readers.push(create_test_user(db, &format!("{}{}", prefix, n), false).await?);
    }
    Ok(readers)
}
