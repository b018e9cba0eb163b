use async_trait::async_trait;
use serde::Deserialize;

use crate::models::bookmark::{BookmarkDetail, BookmarkUpdate};
use crate::oauth::TokenPair;

pub const REQUEST_TOKEN_URL: &str = "https://www.hatena.com/oauth/initiate";
pub const ACCESS_TOKEN_URL: &str = "https://www.hatena.com/oauth/token";
pub const AUTHORIZE_URL: &str = "https://www.hatena.ne.jp/oauth/authorize";
pub const AUTHORIZE_URL_SP: &str = "https://www.hatena.ne.jp/touch/oauth/authorize";
pub const REST_BASE_URL: &str = "https://bookmark.hatenaapis.com/rest/1";
pub const FEED_BASE_URL: &str = "https://b.hatena.ne.jp";

/// Where the client sends each kind of request. Defaults to the live service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub request_token: String,
    pub access_token: String,
    pub rest_base: String,
    pub feed_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            request_token: REQUEST_TOKEN_URL.to_string(),
            access_token: ACCESS_TOKEN_URL.to_string(),
            rest_base: REST_BASE_URL.to_string(),
            feed_base: FEED_BASE_URL.to_string(),
        }
    }
}

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bookmark API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Everything the web handlers need from the bookmark service.
#[async_trait]
pub trait BookmarkService: Send + Sync {
    /// Temporary credentials for the authorization redirect.
    async fn request_token(&self, callback: &str) -> Result<TokenPair, ApiError>;

    /// Exchanges an authorized request token for an access token.
    async fn access_token(&self, request: &TokenPair, verifier: &str) -> Result<TokenPair, ApiError>;

    async fn username(&self, token: &TokenPair) -> Result<String, ApiError>;

    async fn bookmark(&self, token: &TokenPair, url: &str) -> Result<BookmarkDetail, ApiError>;

    async fn update_bookmark(&self, token: &TokenPair, update: &BookmarkUpdate) -> Result<(), ApiError>;

    /// Raw RSS of the user's read-later bookmarks, one page at a time.
    async fn bookmark_feed(&self, token: &TokenPair, username: &str, page: u32) -> Result<String, ApiError>;

    /// Where the user approves `request`. The touch variant is for phones.
    fn authorize_url(&self, request: &TokenPair, smartphone: bool) -> String {
        let base = if smartphone { AUTHORIZE_URL_SP } else { AUTHORIZE_URL };
        format!("{}?oauth_token={}", base, crate::oauth::encode(&request.token))
    }
}

#[derive(Debug, Deserialize)]
pub struct MyResponse {
    pub name: String,
}
