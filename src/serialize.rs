//! Flattens query results into the plain records the templates render.

use crate::app_config::AppConfig;
use crate::post::{post_url, CommentRow, PostCard, PostDetail};
use crate::tag::{tag_url, TagRecord};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Presentation settings that do not come from the database.
#[derive(Clone, Debug)]
pub struct SerializeOptions {
    /// Prefix for stored image paths.
    pub media_url: String,
    /// Characters of body text kept in a teaser.
    pub teaser_length: usize,
}

impl SerializeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            media_url: config.media.url.to_owned(),
            teaser_length: config.limits.teaser_length,
        }
    }

    /// Public URL of a stored image, `None` when the post has no image.
    pub fn image_url(&self, image: Option<&str>) -> Option<String> {
        match image {
            Some(path) if !path.is_empty() => Some(format!("{}{}", self.media_url, path)),
            _ => None,
        }
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// First `length` characters of `text`. Cuts mid-word.
pub fn teaser(text: &str, length: usize) -> String {
    text.chars().take(length).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagView {
    pub title: String,
    pub posts_with_tag: i64,
}

impl TagView {
    pub fn get_url(&self) -> String {
        tag_url(&self.title)
    }
}

pub fn serialize_tag(tag: &TagRecord) -> TagView {
    TagView {
        title: tag.title.to_owned(),
        posts_with_tag: tag.posts_count.unwrap_or(0),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PostView {
    pub title: String,
    pub teaser_text: String,
    pub author: String,
    pub comments_amount: i64,
    pub image_url: Option<String>,
    pub published_at: NaiveDateTime,
    pub slug: String,
    pub tags: Vec<TagView>,
    pub first_tag_title: Option<String>,
}

impl PostView {
    pub fn get_url(&self) -> String {
        post_url(&self.slug)
    }
}

pub fn serialize_post(card: &PostCard, options: &SerializeOptions) -> PostView {
    PostView {
        title: card.post.title.to_owned(),
        teaser_text: teaser(&card.post.text, options.teaser_length),
        author: card.post.author.to_owned(),
        comments_amount: card.comments_count.unwrap_or(0),
        image_url: options.image_url(card.post.image.as_deref()),
        published_at: card.post.published_at,
        slug: card.post.slug.to_owned(),
        tags: card.tags.iter().map(serialize_tag).collect(),
        first_tag_title: card.first_tag().map(|tag| tag.title.to_owned()),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentView {
    pub text: String,
    pub published_at: NaiveDateTime,
    pub author: String,
}

impl From<&CommentRow> for CommentView {
    fn from(comment: &CommentRow) -> Self {
        Self {
            text: comment.text.to_owned(),
            published_at: comment.published_at,
            author: comment.author.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PostDetailView {
    pub title: String,
    pub text: String,
    pub author: String,
    pub comments: Vec<CommentView>,
    pub likes_amount: i64,
    pub image_url: Option<String>,
    pub published_at: NaiveDateTime,
    pub slug: String,
    pub tags: Vec<TagView>,
}

pub fn serialize_post_detail(detail: &PostDetail, options: &SerializeOptions) -> PostDetailView {
    PostDetailView {
        title: detail.post.title.to_owned(),
        text: detail.post.text.to_owned(),
        author: detail.author.to_owned(),
        comments: detail.comments.iter().map(CommentView::from).collect(),
        likes_amount: detail.likes_count,
        image_url: options.image_url(detail.post.image.as_deref()),
        published_at: detail.post.published_at,
        slug: detail.post.slug.to_owned(),
        tags: detail.tags.iter().map(serialize_tag).collect(),
    }
}
