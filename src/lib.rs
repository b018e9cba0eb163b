pub mod api;
pub mod config;
pub mod errors;
pub mod hatena;
pub mod models;
pub mod oauth;
pub mod observability;
pub mod page;
pub mod schema;
pub mod security;
pub mod session;
#[cfg(test)]
pub mod test_helpers;
pub mod web_ui;

// Type definitions
use actix_web::web;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type RqDbPool = web::Data<DbPool>;
pub type RqBookmarks = web::Data<dyn hatena::BookmarkService>;
pub type RqConfig = web::Data<config::AppConfig>;
