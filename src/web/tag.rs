use crate::app_config::{self, SiteConfig};
use crate::error::BlogError;
use crate::pages::{Pages, TagFeedPage};
use crate::tag::decode_title;
use actix_web::{get, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_tag);
}

#[derive(Template)]
#[template(path = "posts_list.html")]
pub struct TagTemplate {
    pub site: SiteConfig,
    pub page: TagFeedPage,
}

/// Posts carrying one tag. The title must match exactly.
#[get("/tag/{tag_title}")]
pub async fn view_tag(
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String,)>,
) -> Result<impl Responder, BlogError> {
    let tag_title = decode_title(&path.into_inner().0).ok_or(BlogError::NotFound("Tag"))?;
    let config = app_config::get_config();
    let page = Pages::new(db.get_ref(), &config).tag_feed(&tag_title).await?;

    Ok(TagTemplate {
        site: config.site,
        page,
    }
    .to_response())
}
