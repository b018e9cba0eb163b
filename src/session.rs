use std::future::{ready, Ready};

use crate::models::session::Session;
use crate::oauth::TokenPair;
use crate::RqDbPool;
use actix_web::{
    dev::Payload, error::ResponseError, http::StatusCode, FromRequest, HttpRequest, HttpResponse,
};
use derive_more::Display;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Display)]
pub enum SessionError {
    #[display(fmt = "database_error")]
    DatabaseError,
}

impl ResponseError for SessionError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError().json(serde_json::json!({
            "error": {
                "code": "SESSION_STORE_ERROR",
                "message": "Internal server error"
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Whoever is making the request, with their session if the cookie points
/// at a live one. Never rejects a request for being logged out; handlers
/// decide what logged out means for them.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub session: Option<Session>,
}

/// A session that holds an access token.
#[derive(Debug, Clone)]
pub struct Login {
    pub session_id: String,
    pub token: TokenPair,
    pub username: Option<String>,
}

impl Visitor {
    pub fn login(&self) -> Option<Login> {
        let session = self.session.as_ref()?;
        let token = session.access_pair()?;
        Some(Login {
            session_id: session.session_id.clone(),
            token,
            username: session.username.clone(),
        })
    }
}

impl FromRequest for Visitor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session_id = match req.cookie(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                log::debug!("No session cookie found");
                return ready(Ok(Visitor { session: None }));
            }
        };

        let pool = match req.app_data::<RqDbPool>() {
            Some(pool) => pool.get_ref().clone(),
            None => {
                log::error!("Failed to get database pool from app data");
                return ready(Err(SessionError::DatabaseError.into()));
            }
        };

        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(_) => return ready(Err(SessionError::DatabaseError.into())),
        };

        let session = Session::get_valid(&mut conn, &session_id);
        match &session {
            Some(session) => {
                if session.touch(&mut conn).is_err() {
                    log::warn!("Failed to update session last_accessed time");
                }
            }
            None => log::debug!("Invalid or expired session: {}", session_id),
        }

        ready(Ok(Visitor { session }))
    }
}

/// Session cookie helpers
pub mod session_manager {
    use super::*;
    use actix_web::cookie::{time::OffsetDateTime, Cookie, SameSite};

    /// Cookie pointing the browser at `session`. SameSite=Lax so it survives
    /// the top-level redirect back from the authorization page.
    pub fn session_cookie(session: &Session) -> Cookie<'static> {
        let is_production = !cfg!(debug_assertions);
        let mut cookie = Cookie::build(SESSION_COOKIE, session.session_id.clone())
            .secure(is_production)
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .finish();
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(session.expires_at as i64) {
            cookie.set_expires(expires);
        }
        cookie
    }
}
