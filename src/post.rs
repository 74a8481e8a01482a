//! Post queries: popularity, recency, tag filtering, and the batch
//! annotations used by every list page.

use crate::orm::{comments, post_likes, post_tags, posts, users};
use crate::tag::{TagRecord, TagRepository};
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult,
    PaginatorTrait,
};
use std::collections::HashMap;

/// Base URL fragment for resource.
pub static RESOURCE_URL: &str = "post";

/// A post joined with its author's name and like count.
#[derive(Clone, Debug, FromQueryResult)]
pub struct PostRow {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub slug: String,
    pub image: Option<String>,
    pub published_at: NaiveDateTime,
    pub author_id: i32,
    pub author: String,
    pub likes_count: i64,
}

pub fn post_url(slug: &str) -> String {
    format!("/{}/{}", RESOURCE_URL, slug)
}

/// A post ready for a list view.
#[derive(Clone, Debug)]
pub struct PostCard {
    pub post: PostRow,
    /// Sorted by tag popularity with counts, or in title order without
    /// counts on the tag feed.
    pub tags: Vec<TagRecord>,
    /// `None` until [`PostRepository::with_comments_count`] has run.
    pub comments_count: Option<i64>,
}

impl PostCard {
    pub fn first_tag(&self) -> Option<&TagRecord> {
        self.tags.first()
    }
}

#[derive(Clone, Debug, FromQueryResult)]
pub struct CommentRow {
    pub text: String,
    pub published_at: NaiveDateTime,
    pub author: String,
}

/// Everything the detail page shows about one post.
#[derive(Clone, Debug)]
pub struct PostDetail {
    pub post: posts::Model,
    pub author: String,
    pub likes_count: i64,
    /// Oldest first.
    pub comments: Vec<CommentRow>,
    /// Title order, no counts.
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, FromQueryResult)]
struct CommentCountRow {
    post_id: i32,
    comments_count: i64,
}

pub struct PostRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PostRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    fn likes_count_expr() -> sea_orm::sea_query::SimpleExpr {
        Expr::col((post_likes::Entity, post_likes::Column::Id)).count()
    }

    /// Posts with author name and like count, one row per post.
    fn listing_select() -> Select<posts::Entity> {
        posts::Entity::find()
            .column_as(users::Column::Username, "author")
            .column_as(Self::likes_count_expr(), "likes_count")
            .join(JoinType::InnerJoin, posts::Relation::Author.def())
            .join(JoinType::LeftJoin, posts::Relation::Likes.def())
            .group_by(posts::Column::Id)
            .group_by(users::Column::Username)
    }

    /// Most liked posts first; equal like counts fall back to newest first.
    pub async fn popular(&self, limit: u64) -> Result<Vec<PostRow>, DbErr> {
        Self::listing_select()
            .order_by_desc(Self::likes_count_expr())
            .order_by_desc(posts::Column::PublishedAt)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .into_model::<PostRow>()
            .all(self.db)
            .await
    }

    /// Newest posts first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<PostRow>, DbErr> {
        Self::listing_select()
            .order_by_desc(posts::Column::PublishedAt)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .into_model::<PostRow>()
            .all(self.db)
            .await
    }

    /// Posts carrying the given tag, in default (newest first) order.
    pub async fn for_tag(&self, tag_id: i32, limit: u64) -> Result<Vec<PostRow>, DbErr> {
        Self::listing_select()
            .join(JoinType::InnerJoin, posts::Relation::PostTags.def())
            .filter(post_tags::Column::TagId.eq(tag_id))
            .order_by_desc(posts::Column::PublishedAt)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .into_model::<PostRow>()
            .all(self.db)
            .await
    }

    /// Attaches popularity-sorted tags to each post using one batch fetch.
    pub async fn with_tags(&self, rows: Vec<PostRow>) -> Result<Vec<PostCard>, DbErr> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut tags = TagRepository::new(self.db).popular_for_posts(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|post| PostCard {
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
                comments_count: None,
            })
            .collect())
    }

    /// Attaches tags in title order without counts, using one batch fetch.
    pub async fn with_plain_tags(&self, rows: Vec<PostRow>) -> Result<Vec<PostCard>, DbErr> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut tags = TagRepository::new(self.db).for_posts(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|post| PostCard {
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
                comments_count: None,
            })
            .collect())
    }

    /// Number of comments per post id, from a single grouped query.
    /// Posts without comments are absent from the map.
    pub async fn comments_count_by_post(
        &self,
        post_ids: &[i32],
    ) -> Result<HashMap<i32, i64>, DbErr> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = comments::Entity::find()
            .select_only()
            .column(comments::Column::PostId)
            .column_as(
                Expr::col((comments::Entity, comments::Column::Id)).count(),
                "comments_count",
            )
            .filter(comments::Column::PostId.is_in(post_ids.iter().copied()))
            .group_by(comments::Column::PostId)
            .into_model::<CommentCountRow>()
            .all(self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.post_id, row.comments_count))
            .collect())
    }

    /// Overlays comment counts on the cards without reordering them.
    pub async fn with_comments_count(
        &self,
        mut cards: Vec<PostCard>,
    ) -> Result<Vec<PostCard>, DbErr> {
        let ids: Vec<i32> = cards.iter().map(|card| card.post.id).collect();
        let counts = self.comments_count_by_post(&ids).await?;

        for card in cards.iter_mut() {
            card.comments_count = Some(counts.get(&card.post.id).copied().unwrap_or(0));
        }

        Ok(cards)
    }

    /// Both batch annotations, as every list view needs them.
    pub async fn cards(&self, rows: Vec<PostRow>) -> Result<Vec<PostCard>, DbErr> {
        let cards = self.with_tags(rows).await?;
        self.with_comments_count(cards).await
    }

    /// Loads a post with its author, likes, comments and tags.
    /// Returns `None` when no post has the slug.
    pub async fn detail_by_slug(&self, slug: &str) -> Result<Option<PostDetail>, DbErr> {
        let (post, author) = match posts::Entity::find()
            .filter(posts::Column::Slug.eq(slug))
            .find_also_related(users::Entity)
            .one(self.db)
            .await?
        {
            Some((post, Some(author))) => (post, author),
            Some((post, None)) => {
                log::error!("post {} references missing author {}", post.id, post.author_id);
                return Err(DbErr::RecordNotFound(format!(
                    "author {} of post {}",
                    post.author_id, post.id
                )));
            }
            None => return Ok(None),
        };

        let likes_count = post_likes::Entity::find()
            .filter(post_likes::Column::PostId.eq(post.id))
            .count(self.db)
            .await? as i64;

        let comments = comments::Entity::find()
            .select_only()
            .column(comments::Column::Text)
            .column(comments::Column::PublishedAt)
            .column_as(users::Column::Username, "author")
            .join(JoinType::InnerJoin, comments::Relation::Author.def())
            .filter(comments::Column::PostId.eq(post.id))
            .order_by_asc(comments::Column::PublishedAt)
            .order_by_asc(comments::Column::Id)
            .into_model::<CommentRow>()
            .all(self.db)
            .await?;

        let tags = TagRepository::new(self.db).for_post(post.id).await?;

        Ok(Some(PostDetail {
            post,
            author: author.username,
            likes_count,
            comments,
            tags,
        }))
    }
}
