use crate::app_config::{self, SiteConfig};
use crate::error::BlogError;
use crate::pages::{IndexPage, Pages};
use actix_web::{get, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub site: SiteConfig,
    pub page: IndexPage,
}

/// Home feed: most liked posts, newest posts and most used tags.
#[get("/")]
pub async fn view_index(db: web::Data<DatabaseConnection>) -> Result<impl Responder, BlogError> {
    let config = app_config::get_config();
    let page = Pages::new(db.get_ref(), &config).index().await?;

    Ok(IndexTemplate {
        site: config.site,
        page,
    }
    .to_response())
}
