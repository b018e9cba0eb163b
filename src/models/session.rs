use crate::oauth::TokenPair;
use crate::schema::sessions;
use chrono::Utc;
use diesel::{prelude::*, result::Error as DieselError, SqliteConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSION_LIFETIME_SECS: i32 = 30 * 24 * 60 * 60; // 30 days

#[derive(Queryable, Identifiable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: i32,
    pub session_id: String,
    pub request_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_secret: Option<String>,
    pub username: Option<String>,
    pub expires_at: i32,
    pub created_at: i32,
    pub last_accessed: i32,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub session_id: String,
    pub expires_at: i32,
    pub created_at: i32,
    pub last_accessed: i32,
}

/// Outer `None` leaves a column alone, `Some(None)` clears it.
#[derive(AsChangeset, Default)]
#[diesel(table_name = sessions)]
pub struct SessionUpdate {
    pub request_secret: Option<Option<String>>,
    pub access_token: Option<Option<String>>,
    pub access_secret: Option<Option<String>>,
    pub username: Option<Option<String>>,
    pub last_accessed: Option<i32>,
}

impl Session {
    /// Create a new, not yet authorized session
    pub fn create(conn: &mut SqliteConnection) -> Result<Self, DieselError> {
        let now = Utc::now().timestamp() as i32;
        let new_session = NewSession {
            session_id: Uuid::new_v4().to_string(),
            expires_at: now + SESSION_LIFETIME_SECS,
            created_at: now,
            last_accessed: now,
        };

        diesel::insert_into(sessions::table)
            .values(&new_session)
            .returning(Session::as_returning())
            .get_result(conn)
    }

    /// Get session by session_id if not expired
    pub fn get_valid(conn: &mut SqliteConnection, session_id: &str) -> Option<Self> {
        let now = Utc::now().timestamp() as i32;

        sessions::table
            .filter(sessions::session_id.eq(session_id))
            .filter(sessions::expires_at.gt(now))
            .first(conn)
            .ok()
    }

    /// The access token, once the OAuth dance has completed.
    pub fn access_pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.access_secret) {
            (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
                Some(TokenPair {
                    token: token.clone(),
                    secret: secret.clone(),
                })
            }
            _ => None,
        }
    }

    fn update(
        conn: &mut SqliteConnection,
        session_id: &str,
        update: &SessionUpdate,
    ) -> Result<(), DieselError> {
        let updated = diesel::update(sessions::table.filter(sessions::session_id.eq(session_id)))
            .set(update)
            .execute(conn)?;
        if updated == 0 {
            return Err(DieselError::NotFound);
        }
        Ok(())
    }

    /// Update last_accessed timestamp for a session
    pub fn touch(&self, conn: &mut SqliteConnection) -> Result<(), DieselError> {
        let update = SessionUpdate {
            last_accessed: Some(Utc::now().timestamp() as i32),
            ..Default::default()
        };
        Self::update(conn, &self.session_id, &update)
    }

    /// Remember the request token secret until the callback arrives
    pub fn set_request_secret(
        conn: &mut SqliteConnection,
        session_id: &str,
        secret: &str,
    ) -> Result<(), DieselError> {
        let update = SessionUpdate {
            request_secret: Some(Some(secret.to_string())),
            ..Default::default()
        };
        Self::update(conn, session_id, &update)
    }

    /// Store the access token and drop the request secret
    pub fn set_access_token(
        conn: &mut SqliteConnection,
        session_id: &str,
        pair: &TokenPair,
    ) -> Result<(), DieselError> {
        let update = SessionUpdate {
            request_secret: Some(None),
            access_token: Some(Some(pair.token.clone())),
            access_secret: Some(Some(pair.secret.clone())),
            username: Some(None),
            ..Default::default()
        };
        Self::update(conn, session_id, &update)
    }

    pub fn set_username(
        conn: &mut SqliteConnection,
        session_id: &str,
        username: &str,
    ) -> Result<(), DieselError> {
        let update = SessionUpdate {
            username: Some(Some(username.to_string())),
            ..Default::default()
        };
        Self::update(conn, session_id, &update)
    }

    /// Forget the login but keep the session row
    pub fn clear_tokens(conn: &mut SqliteConnection, session_id: &str) -> Result<(), DieselError> {
        let update = SessionUpdate {
            request_secret: Some(None),
            access_token: Some(None),
            access_secret: Some(None),
            username: Some(None),
            ..Default::default()
        };
        Self::update(conn, session_id, &update)
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(conn: &mut SqliteConnection) -> Result<usize, DieselError> {
        let now = Utc::now().timestamp() as i32;

        diesel::delete(sessions::table.filter(sessions::expires_at.le(now))).execute(conn)
    }
}
