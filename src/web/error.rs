//! HTML bodies for error responses, installed through `ErrorHandlers`.

use crate::app_config::{self, SiteConfig};
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub site: SiteConfig,
    pub status: u16,
    pub message: &'a str,
}

fn render_error<B>(res: ServiceResponse<B>, message: &str) -> Result<ErrorHandlerResponse<B>> {
    let (req, res) = res.into_parts();
    let status = res.status();

    let body = ErrorTemplate {
        site: app_config::site(),
        status: status.as_u16(),
        message,
    }
    .render()
    .unwrap_or_else(|e| {
        log::error!("error page failed to render: {}", e);
        message.to_owned()
    });

    let res = HttpResponse::build(status)
        .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
        .body(body);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, res).map_into_right_body(),
    ))
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "The request could not be understood.")
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "The page you are looking for does not exist.")
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(res, "Something went wrong on our side.")
}
