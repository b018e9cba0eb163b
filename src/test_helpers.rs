use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::hatena::{ApiError, BookmarkService};
use crate::models::bookmark::{BookmarkDetail, BookmarkUpdate, READ_LATER_TAG};
use crate::models::session::Session;
use crate::oauth::TokenPair;
use crate::{DbPool, MIGRATIONS};

/// Create a test database with a temporary file
pub fn create_test_db() -> (TempDir, DbPool) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let database_url = db_path.display().to_string();

    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to create pool");

    let mut conn = pool.get().expect("Failed to get connection");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

/// Create an in-memory test database connection
pub fn get_test_db_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .unwrap_or_else(|_| panic!("Error connecting to in-memory SQLite database"));

    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    conn
}

pub fn test_config() -> AppConfig {
    AppConfig {
        public_path: "static".to_string(),
        db_path: ":memory:".to_string(),
        bind: "127.0.0.1".to_string(),
        port: 8080,
        consumer_key: "consumer".to_string(),
        consumer_secret: "consumer-secret".to_string(),
        callback_url: "http://127.0.0.1:8080/oauth/callback".to_string(),
        scope: "read_public,write_public".to_string(),
        max_read_all_rounds: 20,
    }
}

pub fn access_token() -> TokenPair {
    TokenPair {
        token: "access-token".to_string(),
        secret: "access-secret".to_string(),
    }
}

/// A session that already finished the OAuth dance. Returns its cookie value.
pub fn logged_in_session(pool: &DbPool) -> String {
    let mut conn = pool.get().expect("Failed to get connection");
    let session = Session::create(&mut conn).expect("Failed to create session");
    Session::set_access_token(&mut conn, &session.session_id, &access_token())
        .expect("Failed to store access token");
    session.session_id
}

#[derive(Debug, Clone)]
pub struct FakeEntry {
    pub url: String,
    pub title: String,
    pub detail: BookmarkDetail,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub entries: Vec<FakeEntry>,
    pub updates: Vec<BookmarkUpdate>,
    pub failing_urls: HashSet<String>,
    pub reject_token: bool,
    pub username_calls: usize,
    pub feed_pages: Vec<u32>,
}

/// In-memory stand-in for the bookmark service. Marked-read entries drop out
/// of the feed like they do upstream.
#[derive(Debug, Default)]
pub struct FakeBookmarks {
    pub state: Mutex<FakeState>,
}

impl FakeBookmarks {
    pub fn with_entries(urls: &[&str]) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            for url in urls {
                state.entries.push(FakeEntry {
                    url: url.to_string(),
                    title: format!("Title of {url}"),
                    detail: BookmarkDetail {
                        comment_raw: format!("[{READ_LATER_TAG}]note"),
                        tags: vec![READ_LATER_TAG.to_string(), "misc".to_string()],
                    },
                });
            }
        }
        Arc::new(fake)
    }

    pub fn fail_on(&self, url: &str) {
        self.state.lock().unwrap().failing_urls.insert(url.to_string());
    }

    pub fn reject_token(&self) {
        self.state.lock().unwrap().reject_token = true;
    }

    pub fn updates(&self) -> Vec<BookmarkUpdate> {
        self.state.lock().unwrap().updates.clone()
    }

    fn check_token(&self, token: &TokenPair) -> Result<(), ApiError> {
        if self.state.lock().unwrap().reject_token || token.token != access_token().token {
            return Err(ApiError::Status {
                status: 401,
                body: "oauth_problem=token_rejected".to_string(),
            });
        }
        Ok(())
    }
}

pub fn rss_document(entries: &[FakeEntry]) -> String {
    let items: String = entries
        .iter()
        .map(|entry| {
            format!(
                "<item rdf:about=\"{url}\"><title>{title}</title><link>{url}</link>\
                 <dc:date>2024-05-01T09:30:00+09:00</dc:date></item>",
                url = entry.url,
                title = entry.title
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rdf:RDF xmlns=\"http://purl.org/rss/1.0/\" \
         xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
         <channel rdf:about=\"https://b.hatena.ne.jp/alice/bookmark\">\
         <title>alice</title><link>https://b.hatena.ne.jp/alice/bookmark</link>\
         <description>alice</description></channel>{items}</rdf:RDF>"
    )
}

#[async_trait]
impl BookmarkService for FakeBookmarks {
    async fn request_token(&self, _callback: &str) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            token: "request-token".to_string(),
            secret: "request-secret".to_string(),
        })
    }

    async fn access_token(&self, request: &TokenPair, verifier: &str) -> Result<TokenPair, ApiError> {
        if request.secret != "request-secret" || verifier != "verifier" {
            return Err(ApiError::Status {
                status: 401,
                body: "oauth_problem=verifier_invalid".to_string(),
            });
        }
        Ok(access_token())
    }

    async fn username(&self, token: &TokenPair) -> Result<String, ApiError> {
        self.check_token(token)?;
        self.state.lock().unwrap().username_calls += 1;
        Ok("alice".to_string())
    }

    async fn bookmark(&self, token: &TokenPair, url: &str) -> Result<BookmarkDetail, ApiError> {
        self.check_token(token)?;
        let state = self.state.lock().unwrap();
        if state.failing_urls.contains(url) {
            return Err(ApiError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        state
            .entries
            .iter()
            .find(|entry| entry.url == url)
            .map(|entry| entry.detail.clone())
            .ok_or(ApiError::Status {
                status: 404,
                body: String::new(),
            })
    }

    async fn update_bookmark(&self, token: &TokenPair, update: &BookmarkUpdate) -> Result<(), ApiError> {
        self.check_token(token)?;
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.iter_mut().find(|entry| entry.url == update.url) {
            entry.detail.comment_raw = update.comment.clone();
            entry.detail.tags = update.tags.clone();
        }
        state.updates.push(update.clone());
        Ok(())
    }

    async fn bookmark_feed(&self, token: &TokenPair, username: &str, page: u32) -> Result<String, ApiError> {
        self.check_token(token)?;
        assert_eq!(username, "alice");
        let mut state = self.state.lock().unwrap();
        state.feed_pages.push(page);

        let page_size = 2;
        let pending: Vec<FakeEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.detail.is_read_later())
            .skip((page.saturating_sub(1) as usize) * page_size)
            .take(page_size)
            .cloned()
            .collect();
        Ok(rss_document(&pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_db() {
        let (_temp_dir, pool) = create_test_db();
        let mut conn = pool.get().expect("Failed to get connection");

        let count: i64 = crate::schema::sessions::table
            .count()
            .get_result(&mut conn)
            .expect("Failed to query test database");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_logged_in_session_has_token() {
        let (_temp_dir, pool) = create_test_db();
        let session_id = logged_in_session(&pool);

        let mut conn = pool.get().unwrap();
        let session = Session::get_valid(&mut conn, &session_id).unwrap();
        assert_eq!(session.access_pair(), Some(access_token()));
    }
}
