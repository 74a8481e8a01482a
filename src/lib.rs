pub mod admin;
pub mod app_config;
pub mod constants;
pub mod db;
pub mod error;
pub mod orm;
pub mod pages;
pub mod post;
pub mod serialize;
pub mod tag;
pub mod web;

pub use error::BlogError;
