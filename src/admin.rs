//! Data-entry operations for posts, tags, comments and likes.
//!
//! Every write the public pages depend on passes through here, so this is
//! where malformed input is rejected: non-staff authors, bad or duplicate
//! slugs, duplicate tag titles and unknown related ids.

use crate::error::{is_unique_violation, BlogError};
use crate::orm::{comments, post_likes, post_tags, posts, tags, users};
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, ActiveValue::Set, ConnectionTrait, DatabaseConnection, FromQueryResult,
    TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use validator::{Validate, ValidationError};

/// Slugs are limited to ASCII letters, digits, hyphens and underscores.
fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(length(min = 1, max = 200), custom = "validate_slug")]
    pub slug: String,
    pub image: Option<String>,
    pub published_at: NaiveDateTime,
    pub author_id: i32,
    /// Raw tag ids; no tag list is loaded to pick from.
    #[serde(default)]
    pub tag_ids: Vec<i32>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct TagForm {
    /// Length is checked on the trimmed, lowercased title.
    #[validate(length(min = 1, max = 20))]
    pub title: String,
}

impl TagForm {
    /// The title as it will be stored, validated in that form.
    pub fn normalized_title(&self) -> Result<String, BlogError> {
        let normalized = TagForm {
            title: self.title.trim().to_lowercase(),
        };
        normalized.validate()?;
        Ok(normalized.title)
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CommentForm {
    /// Raw post id.
    pub post_id: i32,
    pub author_id: i32,
    #[validate(length(min = 1))]
    pub text: String,
    pub published_at: NaiveDateTime,
}

/// Post list row with the author loaded in the same query.
#[derive(Clone, Debug, FromQueryResult)]
pub struct PostAdminRow {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub slug: String,
    pub image: Option<String>,
    pub published_at: NaiveDateTime,
    pub author: String,
}

impl fmt::Display for PostAdminRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Comment list row with post and author loaded in the same query.
#[derive(Clone, Debug, FromQueryResult)]
pub struct CommentAdminRow {
    pub id: i32,
    pub post_title: String,
    pub author: String,
    pub text: String,
    pub published_at: NaiveDateTime,
}

impl fmt::Display for CommentAdminRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} under {}", self.author, self.post_title)
    }
}

/// Outcome of [`normalize_tag_titles`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// (old title, new title)
    pub renamed: Vec<(String, String)>,
    /// Titles left untouched because their lowercase form is taken.
    pub conflicts: Vec<String>,
}

fn rejected(reason: String) -> BlogError {
    log::debug!("Rejected data entry: {}", reason);
    BlogError::Invalid(reason)
}

async fn check_author<C: ConnectionTrait>(db: &C, author_id: i32) -> Result<(), BlogError> {
    match users::Entity::find_by_id(author_id).one(db).await? {
        Some(user) if user.is_staff => Ok(()),
        Some(user) => Err(rejected(format!(
            "author {} is not a staff member",
            user.username
        ))),
        None => Err(rejected(format!("unknown author id {}", author_id))),
    }
}

async fn check_slug_free<C: ConnectionTrait>(
    db: &C,
    slug: &str,
    own_id: Option<i32>,
) -> Result<(), BlogError> {
    let mut query = posts::Entity::find().filter(posts::Column::Slug.eq(slug));
    if let Some(id) = own_id {
        query = query.filter(posts::Column::Id.ne(id));
    }

    match query.one(db).await? {
        Some(_) => Err(rejected(format!("slug {} is already used", slug))),
        None => Ok(()),
    }
}

/// Deduplicates the ids and fails on the first one without a tag.
async fn existing_tag_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
) -> Result<Vec<i32>, BlogError> {
    let mut wanted: Vec<i32> = ids.to_vec();
    wanted.sort_unstable();
    wanted.dedup();

    if wanted.is_empty() {
        return Ok(wanted);
    }

    let found: HashSet<i32> = tags::Entity::find()
        .filter(tags::Column::Id.is_in(wanted.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|tag| tag.id)
        .collect();

    match wanted.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(rejected(format!("unknown tag id {}", missing))),
        None => Ok(wanted),
    }
}

async fn replace_tags<C: ConnectionTrait>(
    db: &C,
    post_id: i32,
    tag_ids: &[i32],
) -> Result<(), BlogError> {
    post_tags::Entity::delete_many()
        .filter(post_tags::Column::PostId.eq(post_id))
        .exec(db)
        .await?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    let links = tag_ids.iter().map(|tag_id| post_tags::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(*tag_id),
        ..Default::default()
    });
    post_tags::Entity::insert_many(links).exec(db).await?;

    Ok(())
}

/// Removes posts together with their comments, likes and tag links.
async fn delete_posts_cascade<C: ConnectionTrait>(
    db: &C,
    post_ids: &[i32],
) -> Result<(), BlogError> {
    if post_ids.is_empty() {
        return Ok(());
    }

    comments::Entity::delete_many()
        .filter(comments::Column::PostId.is_in(post_ids.iter().copied()))
        .exec(db)
        .await?;
    post_likes::Entity::delete_many()
        .filter(post_likes::Column::PostId.is_in(post_ids.iter().copied()))
        .exec(db)
        .await?;
    post_tags::Entity::delete_many()
        .filter(post_tags::Column::PostId.is_in(post_ids.iter().copied()))
        .exec(db)
        .await?;
    posts::Entity::delete_many()
        .filter(posts::Column::Id.is_in(post_ids.iter().copied()))
        .exec(db)
        .await?;

    Ok(())
}

pub async fn create_post(
    db: &DatabaseConnection,
    form: PostForm,
) -> Result<posts::Model, BlogError> {
    form.validate()?;

    let txn = db.begin().await?;
    check_author(&txn, form.author_id).await?;
    check_slug_free(&txn, &form.slug, None).await?;
    let tag_ids = existing_tag_ids(&txn, &form.tag_ids).await?;

    let post = posts::ActiveModel {
        title: Set(form.title),
        text: Set(form.text),
        slug: Set(form.slug),
        image: Set(form.image.filter(|path| !path.is_empty())),
        published_at: Set(form.published_at),
        author_id: Set(form.author_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    replace_tags(&txn, post.id, &tag_ids).await?;
    txn.commit().await?;

    log::info!("Created post {} ({})", post.id, post.slug);
    Ok(post)
}

/// Overwrites every field of the post and replaces its tag set.
pub async fn update_post(
    db: &DatabaseConnection,
    post_id: i32,
    form: PostForm,
) -> Result<posts::Model, BlogError> {
    form.validate()?;

    let txn = db.begin().await?;
    let existing = posts::Entity::find_by_id(post_id)
        .one(&txn)
        .await?
        .ok_or(BlogError::NotFound("Post"))?;
    check_author(&txn, form.author_id).await?;
    check_slug_free(&txn, &form.slug, Some(post_id)).await?;
    let tag_ids = existing_tag_ids(&txn, &form.tag_ids).await?;

    let mut post: posts::ActiveModel = existing.into();
    post.title = Set(form.title);
    post.text = Set(form.text);
    post.slug = Set(form.slug);
    post.image = Set(form.image.filter(|path| !path.is_empty()));
    post.published_at = Set(form.published_at);
    post.author_id = Set(form.author_id);
    let post = post.update(&txn).await?;

    replace_tags(&txn, post.id, &tag_ids).await?;
    txn.commit().await?;

    Ok(post)
}

pub async fn delete_post(db: &DatabaseConnection, post_id: i32) -> Result<(), BlogError> {
    let txn = db.begin().await?;
    posts::Entity::find_by_id(post_id)
        .one(&txn)
        .await?
        .ok_or(BlogError::NotFound("Post"))?;
    delete_posts_cascade(&txn, &[post_id]).await?;
    txn.commit().await?;

    log::info!("Deleted post {}", post_id);
    Ok(())
}

async fn check_tag_title_free<C: ConnectionTrait>(
    db: &C,
    title: &str,
    own_id: Option<i32>,
) -> Result<(), BlogError> {
    let mut query = tags::Entity::find().filter(tags::Column::Title.eq(title));
    if let Some(id) = own_id {
        query = query.filter(tags::Column::Id.ne(id));
    }

    match query.one(db).await? {
        Some(_) => Err(rejected(format!("tag {} already exists", title))),
        None => Ok(()),
    }
}

/// A racing insert that trips the unique index reads as a duplicate title.
fn tag_write_error(err: sea_orm::DbErr, title: &str) -> BlogError {
    if is_unique_violation(&err) {
        rejected(format!("tag {} already exists", title))
    } else {
        BlogError::Database(err)
    }
}

/// Stores the title lowercased; titles differing only in case are duplicates.
pub async fn create_tag(db: &DatabaseConnection, form: TagForm) -> Result<tags::Model, BlogError> {
    let title = form.normalized_title()?;
    check_tag_title_free(db, &title, None).await?;

    tags::ActiveModel {
        title: Set(title.to_owned()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| tag_write_error(err, &title))
}

pub async fn rename_tag(
    db: &DatabaseConnection,
    tag_id: i32,
    form: TagForm,
) -> Result<tags::Model, BlogError> {
    let title = form.normalized_title()?;

    let existing = tags::Entity::find_by_id(tag_id)
        .one(db)
        .await?
        .ok_or(BlogError::NotFound("Tag"))?;
    check_tag_title_free(db, &title, Some(tag_id)).await?;

    let mut tag: tags::ActiveModel = existing.into();
    tag.title = Set(title.to_owned());
    tag.update(db)
        .await
        .map_err(|err| tag_write_error(err, &title))
}

/// Removes the tag and detaches it from its posts.
pub async fn delete_tag(db: &DatabaseConnection, tag_id: i32) -> Result<(), BlogError> {
    let txn = db.begin().await?;
    tags::Entity::find_by_id(tag_id)
        .one(&txn)
        .await?
        .ok_or(BlogError::NotFound("Tag"))?;
    post_tags::Entity::delete_many()
        .filter(post_tags::Column::TagId.eq(tag_id))
        .exec(&txn)
        .await?;
    tags::Entity::delete_many()
        .filter(tags::Column::Id.eq(tag_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(())
}

/// Lowercases titles stored before normalization was enforced.
///
/// A title whose lowercase form already belongs to another tag is left as is
/// and reported, since merging would move posts between tags.
pub async fn normalize_tag_titles(
    db: &DatabaseConnection,
) -> Result<NormalizeReport, BlogError> {
    let all = tags::Entity::find()
        .order_by_asc(tags::Column::Id)
        .all(db)
        .await?;
    let mut taken: HashSet<String> = all
        .iter()
        .filter(|tag| tag.title == tag.title.to_lowercase())
        .map(|tag| tag.title.to_owned())
        .collect();

    let mut report = NormalizeReport::default();
    for tag in all {
        let lowered = tag.title.to_lowercase();
        if lowered == tag.title {
            continue;
        }
        if taken.contains(&lowered) {
            log::warn!(
                "Tag {} ({}) collides with existing tag {}",
                tag.id,
                tag.title,
                lowered
            );
            report.conflicts.push(tag.title);
            continue;
        }

        let old_title = tag.title.to_owned();
        let mut active: tags::ActiveModel = tag.into();
        active.title = Set(lowered.to_owned());
        active.update(db).await?;

        taken.insert(lowered.to_owned());
        report.renamed.push((old_title, lowered));
    }

    Ok(report)
}

pub async fn create_comment(
    db: &DatabaseConnection,
    form: CommentForm,
) -> Result<comments::Model, BlogError> {
    form.validate()?;

    if posts::Entity::find_by_id(form.post_id).one(db).await?.is_none() {
        return Err(rejected(format!("unknown post id {}", form.post_id)));
    }
    if users::Entity::find_by_id(form.author_id).one(db).await?.is_none() {
        return Err(rejected(format!(
            "unknown author id {}",
            form.author_id
        )));
    }

    let comment = comments::ActiveModel {
        post_id: Set(form.post_id),
        author_id: Set(form.author_id),
        text: Set(form.text),
        published_at: Set(form.published_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(comment)
}

pub async fn delete_comment(db: &DatabaseConnection, comment_id: i32) -> Result<(), BlogError> {
    let res = comments::Entity::delete_many()
        .filter(comments::Column::Id.eq(comment_id))
        .exec(db)
        .await?;
    if res.rows_affected == 0 {
        return Err(BlogError::NotFound("Comment"));
    }
    Ok(())
}

/// Records a like. Returns `false` when the user already liked the post.
pub async fn like_post(
    db: &DatabaseConnection,
    post_id: i32,
    user_id: i32,
) -> Result<bool, BlogError> {
    if posts::Entity::find_by_id(post_id).one(db).await?.is_none() {
        return Err(BlogError::NotFound("Post"));
    }
    if users::Entity::find_by_id(user_id).one(db).await?.is_none() {
        return Err(rejected(format!("unknown user id {}", user_id)));
    }

    let existing = post_likes::Entity::find()
        .filter(post_likes::Column::PostId.eq(post_id))
        .filter(post_likes::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(false);
    }

    let like = post_likes::ActiveModel {
        post_id: Set(post_id),
        user_id: Set(user_id),
        ..Default::default()
    };
    match like.insert(db).await {
        Ok(_) => Ok(true),
        // A concurrent like landed between the lookup and the insert.
        Err(err) if is_unique_violation(&err) => {
            log::debug!("Post {} already liked by user {}", post_id, user_id);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Removes a like. Returns `false` when there was nothing to remove.
pub async fn unlike_post(
    db: &DatabaseConnection,
    post_id: i32,
    user_id: i32,
) -> Result<bool, BlogError> {
    let res = post_likes::Entity::delete_many()
        .filter(post_likes::Column::PostId.eq(post_id))
        .filter(post_likes::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected > 0)
}

/// Deletes an account with its comments, its likes and the posts it authored.
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<(), BlogError> {
    let txn = db.begin().await?;
    users::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(BlogError::NotFound("User"))?;

    let authored: Vec<i32> = posts::Entity::find()
        .filter(posts::Column::AuthorId.eq(user_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|post| post.id)
        .collect();
    delete_posts_cascade(&txn, &authored).await?;

    comments::Entity::delete_many()
        .filter(comments::Column::AuthorId.eq(user_id))
        .exec(&txn)
        .await?;
    post_likes::Entity::delete_many()
        .filter(post_likes::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    users::Entity::delete_many()
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    log::info!("Deleted user {} and {} authored posts", user_id, authored.len());
    Ok(())
}

/// Posts newest first: title, text, slug, image, publish time, author.
pub async fn list_posts(db: &DatabaseConnection) -> Result<Vec<PostAdminRow>, BlogError> {
    Ok(posts::Entity::find()
        .select_only()
        .column(posts::Column::Id)
        .column(posts::Column::Title)
        .column(posts::Column::Text)
        .column(posts::Column::Slug)
        .column(posts::Column::Image)
        .column(posts::Column::PublishedAt)
        .column_as(users::Column::Username, "author")
        .join(JoinType::InnerJoin, posts::Relation::Author.def())
        .order_by_desc(posts::Column::PublishedAt)
        .into_model::<PostAdminRow>()
        .all(db)
        .await?)
}

pub async fn list_tags(db: &DatabaseConnection) -> Result<Vec<tags::Model>, BlogError> {
    Ok(tags::Entity::find()
        .order_by_asc(tags::Column::Title)
        .all(db)
        .await?)
}

/// Comments oldest first: post, author, text, publish time.
pub async fn list_comments(db: &DatabaseConnection) -> Result<Vec<CommentAdminRow>, BlogError> {
    Ok(comments::Entity::find()
        .select_only()
        .column(comments::Column::Id)
        .column_as(posts::Column::Title, "post_title")
        .column_as(users::Column::Username, "author")
        .column(comments::Column::Text)
        .column(comments::Column::PublishedAt)
        .join(JoinType::InnerJoin, comments::Relation::Post.def())
        .join(JoinType::InnerJoin, comments::Relation::Author.def())
        .order_by_asc(comments::Column::PublishedAt)
        .into_model::<CommentAdminRow>()
        .all(db)
        .await?)
}
