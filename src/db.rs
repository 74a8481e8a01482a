//! Connection pool setup and schema creation.

use crate::app_config::DatabaseConfig;
use crate::orm::{comments, post_likes, post_tags, posts, tags, users};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

/// Opens a connection pool using the database section of the config.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.to_owned());
    options
        .max_connections(config.max_connections)
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(options).await?;
    log::info!("Connected to database ({:?})", db.get_database_backend());
    Ok(db)
}

/// Creates every table from its entity definition.
///
/// Parents are created before children so foreign keys resolve. Unique slugs,
/// unique tag titles and the cascading deletes all come from the entities; the
/// junction tables additionally get a unique index on their pair of ids.
pub async fn create_schema<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut post_tags_table = schema.create_table_from_entity(post_tags::Entity);
    post_tags_table.index(
        Index::create()
            .name("idx-post_tags-post_id-tag_id")
            .col(post_tags::Column::PostId)
            .col(post_tags::Column::TagId)
            .unique(),
    );

    let mut post_likes_table = schema.create_table_from_entity(post_likes::Entity);
    post_likes_table.index(
        Index::create()
            .name("idx-post_likes-post_id-user_id")
            .col(post_likes::Column::PostId)
            .col(post_likes::Column::UserId)
            .unique(),
    );

    let statements = [
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(tags::Entity),
        schema.create_table_from_entity(posts::Entity),
        schema.create_table_from_entity(comments::Entity),
        post_tags_table,
        post_likes_table,
    ];

    for mut stmt in statements {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    log::debug!("Schema created");
    Ok(())
}
