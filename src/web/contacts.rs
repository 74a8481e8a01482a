use crate::app_config::{self, SiteConfig};
use actix_web::{get, Responder};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_contacts);
}

#[derive(Template)]
#[template(path = "contacts.html")]
pub struct ContactsTemplate {
    pub site: SiteConfig,
}

#[get("/contacts/")]
pub async fn view_contacts() -> impl Responder {
    ContactsTemplate {
        site: app_config::site(),
    }
    .to_response()
}
