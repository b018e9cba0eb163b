use std::collections::HashSet;

use actix_web::{get, http::header, post, web, HttpRequest, HttpResponse};
use askama::Template;
use askama_actix::TemplateToResponse;
use serde::Deserialize;

use crate::{
    errors::{AppError, AppResult},
    hatena::BookmarkService,
    log_bookmark_action,
    models::{bookmark::parse_feed, session::Session},
    oauth::TokenPair,
    page::{FeedList, FeedRow, READ_ALL_CONFIRMATION, READ_ALL_PATH},
    security::validation,
    session::{session_manager, Login, Visitor},
    RqBookmarks, RqConfig, RqDbPool,
};

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    logged_in: bool,
    username: String,
    rows: Vec<FeedRow>,
    read_all_path: &'static str,
    read_all_confirmation: &'static str,
}

impl IndexTemplate {
    fn logged_out() -> Self {
        Self {
            logged_in: false,
            username: String::new(),
            rows: Vec::new(),
            read_all_path: READ_ALL_PATH,
            read_all_confirmation: READ_ALL_CONFIRMATION,
        }
    }
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Deserialize)]
struct ReadQuery {
    url: Option<String>,
}

#[derive(Deserialize)]
struct CallbackQuery {
    oauth_token: String,
    oauth_verifier: String,
}

fn redirect_home() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .finish()
}

/// Cached username, asking the API once per login.
async fn username(pool: &RqDbPool, service: &dyn BookmarkService, login: &Login) -> AppResult<String> {
    if let Some(name) = &login.username {
        return Ok(name.clone());
    }

    let name = service.username(&login.token).await?;
    let mut conn = pool.get()?;
    Session::set_username(&mut conn, &login.session_id, &name)?;
    Ok(name)
}

/// Takes one bookmark off the reading list upstream.
async fn mark_read(service: &dyn BookmarkService, token: &TokenPair, url: &str) -> AppResult<()> {
    let detail = service.bookmark(token, url).await?;
    let update = detail.mark_read(url);
    service.update_bookmark(token, &update).await?;
    log_bookmark_action!("mark_read", url);
    Ok(())
}

/// Serve the reading list, or the login link when logged out
#[get("/")]
pub async fn index(pool: RqDbPool, bookmarks: RqBookmarks, visitor: Visitor) -> AppResult<HttpResponse> {
    let login = match visitor.login() {
        Some(login) => login,
        None => return Ok(IndexTemplate::logged_out().to_response()),
    };

    let listing = async {
        let name = username(&pool, bookmarks.get_ref(), &login).await?;
        let xml = bookmarks.bookmark_feed(&login.token, &name, 1).await?;
        Ok::<_, AppError>((name, parse_feed(&xml)?))
    };

    match listing.await {
        Ok((name, entries)) => Ok(IndexTemplate {
            logged_in: true,
            username: name,
            rows: FeedList::new(entries).into_rows(),
            read_all_path: READ_ALL_PATH,
            read_all_confirmation: READ_ALL_CONFIRMATION,
        }
        .to_response()),
        Err(AppError::SessionExpired) => {
            // The API no longer accepts the stored token
            log::info!("Dropping rejected login for session {}", login.session_id);
            let mut conn = pool.get()?;
            Session::clear_tokens(&mut conn, &login.session_id)?;
            Ok(IndexTemplate::logged_out().to_response())
        }
        Err(e) => Err(e),
    }
}

/// Start the OAuth dance: get a request token and send the user to approve it
#[get("/oauth")]
pub async fn oauth_start(
    req: HttpRequest,
    pool: RqDbPool,
    bookmarks: RqBookmarks,
    config: RqConfig,
    visitor: Visitor,
) -> AppResult<HttpResponse> {
    let request = bookmarks.request_token(&config.callback_url).await?;

    let mut conn = pool.get()?;
    let session = match visitor.session {
        Some(session) => session,
        None => Session::create(&mut conn)?,
    };
    Session::set_request_secret(&mut conn, &session.session_id, &request.secret)?;

    let smartphone = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(validation::is_smartphone)
        .unwrap_or(false);
    let location = bookmarks.authorize_url(&request, smartphone);
    log::debug!("Redirecting session {} to {}", session.session_id, location);

    Ok(HttpResponse::SeeOther()
        .cookie(session_manager::session_cookie(&session))
        .append_header((header::LOCATION, location))
        .finish())
}

/// The authorization page sends the user back here
#[get("/oauth/callback")]
pub async fn oauth_callback(
    pool: RqDbPool,
    bookmarks: RqBookmarks,
    query: web::Query<CallbackQuery>,
    visitor: Visitor,
) -> AppResult<HttpResponse> {
    let session = visitor
        .session
        .ok_or_else(|| AppError::invalid_input("session", "no authorization in progress"))?;
    let request_secret = session
        .request_secret
        .clone()
        .ok_or_else(|| AppError::invalid_input("session", "no authorization in progress"))?;

    let query = query.into_inner();
    let request = TokenPair {
        token: query.oauth_token,
        secret: request_secret,
    };
    let access = bookmarks.access_token(&request, &query.oauth_verifier).await?;

    let mut conn = pool.get()?;
    Session::set_access_token(&mut conn, &session.session_id, &access)?;
    log::info!("Session {} logged in", session.session_id);

    Ok(redirect_home())
}

/// Handle logout
#[get("/oauth/logout")]
pub async fn logout(pool: RqDbPool, visitor: Visitor) -> AppResult<HttpResponse> {
    let login = visitor
        .login()
        .ok_or_else(|| AppError::invalid_input("session", "not logged in"))?;

    let mut conn = pool.get()?;
    Session::clear_tokens(&mut conn, &login.session_id)?;
    log::info!("Session {} logged out", login.session_id);

    Ok(redirect_home())
}

/// Raw read-later RSS, one page at a time
#[get("/feed")]
pub async fn feed(
    pool: RqDbPool,
    bookmarks: RqBookmarks,
    query: web::Query<PageQuery>,
    visitor: Visitor,
) -> AppResult<HttpResponse> {
    let login = match visitor.login() {
        Some(login) => login,
        None => return Ok(redirect_home()),
    };

    let page = query.page.unwrap_or(1);
    let name = username(&pool, bookmarks.get_ref(), &login).await?;
    let xml = bookmarks.bookmark_feed(&login.token, &name, page).await?;

    Ok(HttpResponse::Ok().content_type("text/xml").body(xml))
}

/// Mark a single bookmark read. Anything but 2xx leaves the row on the page.
#[post("/feed/read")]
pub async fn mark_as_read(
    bookmarks: RqBookmarks,
    query: web::Query<ReadQuery>,
    visitor: Visitor,
) -> AppResult<HttpResponse> {
    let login = visitor.login().ok_or(AppError::Forbidden)?;
    let url = query
        .into_inner()
        .url
        .ok_or_else(|| AppError::invalid_input("url", "missing"))?;
    validation::validate_url(&url).map_err(|message| AppError::invalid_input("url", &message))?;

    mark_read(bookmarks.get_ref(), &login.token, &url).await?;

    Ok(HttpResponse::Ok().content_type("text/plain").body("ok"))
}

/// Mark everything read, then show the (now empty) list again
#[get("/feed/read_all")]
pub async fn read_all(
    pool: RqDbPool,
    bookmarks: RqBookmarks,
    config: RqConfig,
    visitor: Visitor,
) -> AppResult<HttpResponse> {
    let login = match visitor.login() {
        Some(login) => login,
        None => return Ok(redirect_home()),
    };
    let name = username(&pool, bookmarks.get_ref(), &login).await?;

    // Marked entries drop out of the feed, so page 1 always holds the next batch
    let mut seen = HashSet::new();
    for round in 0..config.max_read_all_rounds {
        let xml = bookmarks.bookmark_feed(&login.token, &name, 1).await?;
        let pending: Vec<_> = parse_feed(&xml)?
            .into_iter()
            .filter(|entry| seen.insert(entry.url.clone()))
            .collect();
        if pending.is_empty() {
            log::debug!("Read-all finished after {} rounds", round);
            break;
        }

        for entry in pending {
            mark_read(bookmarks.get_ref(), &login.token, &entry.url).await?;
        }
    }
    log::info!("Marked {} bookmarks read for {}", seen.len(), name);

    Ok(redirect_home())
}

pub fn routes() -> actix_web::Scope {
    web::scope("")
        .service(index)
        .service(oauth_start)
        .service(oauth_callback)
        .service(logout)
        .service(feed)
        .service(mark_as_read)
        .service(read_all)
}
