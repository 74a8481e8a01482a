use crate::app_config::{self, SiteConfig};
use crate::error::BlogError;
use crate::pages::{Pages, PostDetailPage};
use actix_web::{get, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_post);
}

#[derive(Template)]
#[template(path = "post_details.html")]
pub struct PostTemplate {
    pub site: SiteConfig,
    pub page: PostDetailPage,
}

#[get("/post/{slug}")]
pub async fn view_post(
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String,)>,
) -> Result<impl Responder, BlogError> {
    let slug = path.into_inner().0;
    let config = app_config::get_config();
    let page = Pages::new(db.get_ref(), &config).post_detail(&slug).await?;

    Ok(PostTemplate {
        site: config.site,
        page,
    }
    .to_response())
}
