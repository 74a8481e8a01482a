//! Tag queries: popularity ranking and batch prefetch for post lists.

use crate::orm::{post_tags, tags};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};
use std::collections::HashMap;

/// Base URL fragment for resource.
pub static RESOURCE_URL: &str = "tag";

/// Everything but unreserved characters is escaped in a title segment.
const TITLE_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path of the feed for a tag title, with the title percent-encoded.
pub fn tag_url(title: &str) -> String {
    format!(
        "/{}/{}",
        RESOURCE_URL,
        utf8_percent_encode(title, TITLE_SEGMENT)
    )
}

/// Reverses [`tag_url`] encoding for a title taken from the path.
///
/// The router leaves `%`, `/` and `+` escaped, so the segment is decoded once
/// more here. Returns `None` when the bytes are not UTF-8.
pub fn decode_title(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|title| title.into_owned())
}

/// A tag as handed to the serializers.
///
/// `posts_count` is `Some` only when the query that produced the record
/// computed it; tag lists loaded in default order leave it empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagRecord {
    pub id: i32,
    pub title: String,
    pub posts_count: Option<i64>,
}

impl From<tags::Model> for TagRecord {
    fn from(tag: tags::Model) -> Self {
        Self {
            id: tag.id,
            title: tag.title,
            posts_count: None,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct PopularTagRow {
    id: i32,
    title: String,
    posts_count: i64,
}

impl From<PopularTagRow> for TagRecord {
    fn from(row: PopularTagRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            posts_count: Some(row.posts_count),
        }
    }
}

/// Orders tags by descending post count, then by title.
pub fn sort_by_popularity(tags: &mut [TagRecord]) {
    tags.sort_by(|a, b| {
        b.posts_count
            .unwrap_or(0)
            .cmp(&a.posts_count.unwrap_or(0))
            .then_with(|| a.title.cmp(&b.title))
    });
}

pub struct TagRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TagRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Every tag annotated with its number of posts, most used first.
    /// Tags without posts count as 0 and sort after all used tags.
    fn popular_select() -> Select<tags::Entity> {
        tags::Entity::find()
            .select_only()
            .column(tags::Column::Id)
            .column(tags::Column::Title)
            .column_as(
                Expr::col((post_tags::Entity, post_tags::Column::Id)).count(),
                "posts_count",
            )
            .join(JoinType::LeftJoin, tags::Relation::PostTags.def())
            .group_by(tags::Column::Id)
            .group_by(tags::Column::Title)
            .order_by_desc(Expr::col((post_tags::Entity, post_tags::Column::Id)).count())
            .order_by_asc(tags::Column::Title)
    }

    pub async fn popular(&self, limit: u64) -> Result<Vec<TagRecord>, DbErr> {
        let rows = Self::popular_select()
            .limit(limit)
            .into_model::<PopularTagRow>()
            .all(self.db)
            .await?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    /// Exact, case-sensitive title lookup.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<tags::Model>, DbErr> {
        tags::Entity::find()
            .filter(tags::Column::Title.eq(title))
            .one(self.db)
            .await
    }

    /// Tags of a single post in default (title) order, without counts.
    pub async fn for_post(&self, post_id: i32) -> Result<Vec<TagRecord>, DbErr> {
        let tags = tags::Entity::find()
            .join(JoinType::InnerJoin, tags::Relation::PostTags.def())
            .filter(post_tags::Column::PostId.eq(post_id))
            .order_by_asc(tags::Column::Title)
            .all(self.db)
            .await?;

        Ok(tags.into_iter().map(TagRecord::from).collect())
    }

    /// Tags of many posts in one query, each list in title order without counts.
    pub async fn for_posts(
        &self,
        post_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<TagRecord>>, DbErr> {
        let mut by_post: HashMap<i32, Vec<TagRecord>> =
            post_ids.iter().map(|id| (*id, Vec::new())).collect();

        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let links = post_tags::Entity::find()
            .find_also_related(tags::Entity)
            .filter(post_tags::Column::PostId.is_in(post_ids.iter().copied()))
            .order_by_asc(tags::Column::Title)
            .all(self.db)
            .await?;

        for (link, tag) in links {
            if let (Some(tags), Some(tag)) = (by_post.get_mut(&link.post_id), tag) {
                tags.push(TagRecord::from(tag));
            }
        }

        Ok(by_post)
    }

    /// Loads the tags of many posts at once, each list sorted by popularity.
    ///
    /// Runs two queries regardless of how many posts are requested: one for
    /// the post/tag links and one for the counts of the tags involved. Posts
    /// without tags map to an empty list.
    pub async fn popular_for_posts(
        &self,
        post_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<TagRecord>>, DbErr> {
        let mut by_post: HashMap<i32, Vec<TagRecord>> =
            post_ids.iter().map(|id| (*id, Vec::new())).collect();

        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let links = post_tags::Entity::find()
            .filter(post_tags::Column::PostId.is_in(post_ids.iter().copied()))
            .all(self.db)
            .await?;

        if links.is_empty() {
            return Ok(by_post);
        }

        let mut tag_ids: Vec<i32> = links.iter().map(|link| link.tag_id).collect();
        tag_ids.sort_unstable();
        tag_ids.dedup();

        let counted: HashMap<i32, TagRecord> = Self::popular_select()
            .filter(tags::Column::Id.is_in(tag_ids))
            .into_model::<PopularTagRow>()
            .all(self.db)
            .await?
            .into_iter()
            .map(|row| (row.id, TagRecord::from(row)))
            .collect();

        for link in links {
            if let (Some(tags), Some(tag)) =
                (by_post.get_mut(&link.post_id), counted.get(&link.tag_id))
            {
                if !tags.iter().any(|t| t.id == tag.id) {
                    tags.push(tag.clone());
                }
            }
        }

        for tags in by_post.values_mut() {
            sort_by_popularity(tags);
        }

        Ok(by_post)
    }
}
