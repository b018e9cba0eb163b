//! The reading-list page: rows, their read controls and the read-all control.
//!
//! Each row carries its own bookmark URL and the fully formed action its read
//! control posts to, so the script in `static/js/main.js` never has to walk
//! the DOM to find out which bookmark a button belongs to.
//!
//! The server only renders `FeedRow`s. `FeedList`, `ReadOutcome`, `Confirm`
//! and `ReadAllControl` model what the script does with them in the browser
//! and have no server-side caller; tests drive them against the real routes.

use actix_web::http::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::models::bookmark::Bookmark;

pub const MARK_READ_PATH: &str = "/feed/read";
pub const READ_ALL_PATH: &str = "/feed/read_all";
pub const READ_ALL_CONFIRMATION: &str = "本当に全部読んだことにしていいですか？";

/// Same set `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Action of a read control for the bookmark at `url`.
pub fn mark_read_path(url: &str) -> String {
    format!("{}?url={}", MARK_READ_PATH, utf8_percent_encode(url, URI_COMPONENT))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub url: String,
    pub title: String,
    pub date: String,
    pub read_path: String,
}

impl From<Bookmark> for FeedRow {
    fn from(bookmark: Bookmark) -> Self {
        let read_path = mark_read_path(&bookmark.url);
        Self {
            url: bookmark.url,
            title: bookmark.title,
            date: bookmark.date,
            read_path,
        }
    }
}

/// How a read request ended. `None` stands for a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Succeeded,
    Failed,
}

impl ReadOutcome {
    pub fn from_status(status: Option<StatusCode>) -> Self {
        match status {
            Some(status) if status.is_success() => ReadOutcome::Succeeded,
            _ => ReadOutcome::Failed,
        }
    }

    pub fn removes_row(self) -> bool {
        self == ReadOutcome::Succeeded
    }
}

/// Rows currently shown on the page.
#[derive(Debug, Clone, Default)]
pub struct FeedList {
    rows: Vec<FeedRow>,
}

impl FeedList {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self {
            rows: bookmarks.into_iter().map(FeedRow::from).collect(),
        }
    }

    pub fn rows(&self) -> &[FeedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FeedRow> {
        self.rows
    }

    pub fn contains(&self, url: &str) -> bool {
        self.rows.iter().any(|row| row.url == url)
    }

    /// The request a row's read control issues, if the row is still shown.
    pub fn read_request(&self, url: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.url == url)
            .map(|row| row.read_path.as_str())
    }

    /// Applies the response for `url`'s read request. Only that row can go
    /// away, and only on success. Returns whether a row was removed.
    pub fn apply(&mut self, url: &str, outcome: ReadOutcome) -> bool {
        if !outcome.removes_row() {
            return false;
        }
        match self.rows.iter().position(|row| row.url == url) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Answers the blocking confirmation prompt.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadAllState {
    #[default]
    Idle,
    Prompting,
    Navigating,
}

#[derive(Debug, Default)]
pub struct ReadAllControl {
    state: ReadAllState,
}

impl ReadAllControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadAllState {
        self.state
    }

    /// Prompts once. On confirmation returns the page to navigate to; on
    /// decline nothing happens and the control is idle again.
    pub fn activate<C: Confirm>(&mut self, confirm: &mut C) -> Option<&'static str> {
        if self.state == ReadAllState::Navigating {
            return None;
        }

        self.state = ReadAllState::Prompting;
        if confirm.confirm(READ_ALL_CONFIRMATION) {
            self.state = ReadAllState::Navigating;
            Some(READ_ALL_PATH)
        } else {
            self.state = ReadAllState::Idle;
            None
        }
    }
}
