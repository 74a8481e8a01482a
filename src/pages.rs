//! Page assembly: composes the repositories into the records each page renders.

use crate::app_config::{AppConfig, LimitsConfig};
use crate::error::BlogError;
use crate::post::PostRepository;
use crate::serialize::{
    serialize_post, serialize_post_detail, serialize_tag, PostDetailView, PostView,
    SerializeOptions, TagView,
};
use crate::tag::TagRepository;
use sea_orm::DatabaseConnection;
use serde::Serialize;

/// The popular tags and popular posts shown beside every page but the home feed.
#[derive(Clone, Debug, Serialize)]
pub struct Sidebar {
    pub popular_tags: Vec<TagView>,
    pub most_popular_posts: Vec<PostView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IndexPage {
    pub most_popular_posts: Vec<PostView>,
    pub page_posts: Vec<PostView>,
    pub popular_tags: Vec<TagView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostDetailPage {
    pub post: PostDetailView,
    #[serde(flatten)]
    pub sidebar: Sidebar,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagFeedPage {
    pub tag: String,
    pub posts: Vec<PostView>,
    #[serde(flatten)]
    pub sidebar: Sidebar,
}

pub struct Pages<'a> {
    db: &'a DatabaseConnection,
    limits: LimitsConfig,
    options: SerializeOptions,
}

impl<'a> Pages<'a> {
    pub fn new(db: &'a DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            limits: config.limits.to_owned(),
            options: SerializeOptions::from_config(config),
        }
    }

    fn posts(&self) -> PostRepository<'a> {
        PostRepository::new(self.db)
    }

    fn tags(&self) -> TagRepository<'a> {
        TagRepository::new(self.db)
    }

    async fn popular_tags(&self) -> Result<Vec<TagView>, BlogError> {
        let tags = self.tags().popular(self.limits.popular_tags).await?;
        Ok(tags.iter().map(serialize_tag).collect())
    }

    async fn popular_posts(&self) -> Result<Vec<PostView>, BlogError> {
        let posts = self.posts();
        let cards = posts
            .cards(posts.popular(self.limits.popular_posts).await?)
            .await?;
        Ok(cards
            .iter()
            .map(|card| serialize_post(card, &self.options))
            .collect())
    }

    async fn sidebar(&self) -> Result<Sidebar, BlogError> {
        Ok(Sidebar {
            popular_tags: self.popular_tags().await?,
            most_popular_posts: self.popular_posts().await?,
        })
    }

    /// Most liked posts, newest posts and most used tags.
    pub async fn index(&self) -> Result<IndexPage, BlogError> {
        let posts = self.posts();
        let most_popular_posts = self.popular_posts().await?;
        let fresh = posts
            .cards(posts.recent(self.limits.fresh_posts).await?)
            .await?;
        let popular_tags = self.popular_tags().await?;

        log::debug!(
            "index: {} popular, {} fresh, {} tags",
            most_popular_posts.len(),
            fresh.len(),
            popular_tags.len()
        );

        Ok(IndexPage {
            most_popular_posts,
            page_posts: fresh
                .iter()
                .map(|card| serialize_post(card, &self.options))
                .collect(),
            popular_tags,
        })
    }

    /// A single post with its comments. Unknown slugs are `NotFound`.
    pub async fn post_detail(&self, slug: &str) -> Result<PostDetailPage, BlogError> {
        let detail = self
            .posts()
            .detail_by_slug(slug)
            .await?
            .ok_or(BlogError::NotFound("Post"))?;

        log::debug!(
            "post {}: {} comments, {} likes",
            detail.post.id,
            detail.comments.len(),
            detail.likes_count
        );

        Ok(PostDetailPage {
            post: serialize_post_detail(&detail, &self.options),
            sidebar: self.sidebar().await?,
        })
    }

    /// Posts carrying the tag with exactly this title. Unknown titles are `NotFound`.
    pub async fn tag_feed(&self, tag_title: &str) -> Result<TagFeedPage, BlogError> {
        let tag = self
            .tags()
            .find_by_title(tag_title)
            .await?
            .ok_or(BlogError::NotFound("Tag"))?;

        // Tags of feed posts are loaded in title order, uncounted.
        let posts = self.posts();
        let rows = posts.for_tag(tag.id, self.limits.tag_posts).await?;
        let cards = posts
            .with_comments_count(posts.with_plain_tags(rows).await?)
            .await?;

        log::debug!("tag {}: {} posts", tag.title, cards.len());

        Ok(TagFeedPage {
            tag: tag.title,
            posts: cards
                .iter()
                .map(|card| serialize_post(card, &self.options))
                .collect(),
            sidebar: self.sidebar().await?,
        })
    }
}
