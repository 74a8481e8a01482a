//! Error type shared by the query, page and data-entry layers.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use sea_orm::DbErr;
use validator::ValidationErrors;

#[derive(Debug, Display)]
pub enum BlogError {
    /// The requested slug, title or id has no matching row.
    #[display(fmt = "{} not found.", _0)]
    NotFound(&'static str),
    /// Rejected at the data-entry boundary.
    #[display(fmt = "Invalid input: {}", _0)]
    Invalid(String),
    #[display(fmt = "Database error: {}", _0)]
    Database(DbErr),
}

impl std::error::Error for BlogError {}

impl From<DbErr> for BlogError {
    fn from(err: DbErr) -> Self {
        BlogError::Database(err)
    }
}

impl From<ValidationErrors> for BlogError {
    fn from(errors: ValidationErrors) -> Self {
        BlogError::Invalid(errors.to_string())
    }
}

impl BlogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlogError::NotFound(_))
    }
}

/// True when the database rejected a write because of a unique index.
///
/// Matches the messages of SQLite and Postgres.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("UNIQUE constraint failed")
        || message.contains("duplicate key value violates unique constraint")
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::NotFound(_) => StatusCode::NOT_FOUND,
            BlogError::Invalid(_) => StatusCode::BAD_REQUEST,
            BlogError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Database details stay in the log.
        let message = match self {
            BlogError::Database(err) => {
                log::error!("database error: {}", err);
                "Internal server error.".to_owned()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}
