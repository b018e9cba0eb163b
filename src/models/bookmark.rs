use chrono::{DateTime, FixedOffset, Utc};
use feed_rs::model::Entry;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// Tag that puts a bookmark on the reading list.
pub const READ_LATER_TAG: &str = "あとで読む";
/// The same tag as it appears inline in a bookmark comment.
pub const READ_LATER_MARKER: &str = "[あとで読む]";

/// Feed dates are published in JST; feed-rs hands them back in UTC.
const FEED_OFFSET_SECS: i32 = 9 * 3600;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// `2024-05-01T09:30:00+09:00` as `2024-05-01 09:30:00+09:00`.
fn display_date(date: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(FEED_OFFSET_SECS) {
        Some(offset) => date.with_timezone(&offset).format(DATE_FORMAT).to_string(),
        None => date.format(DATE_FORMAT).to_string(),
    }
}

/// One entry of the reading list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub url: String,
    pub title: String,
    pub date: String,
}

impl Bookmark {
    fn from_entry(entry: Entry) -> Option<Self> {
        let url = match entry.links.into_iter().next() {
            Some(link) => link.href,
            None if entry.id.starts_with("http") => entry.id,
            None => {
                log::debug!("Skipping feed entry without link: {}", entry.id);
                return None;
            }
        };
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| url.clone());
        let date = entry
            .published
            .or(entry.updated)
            .map(display_date)
            .unwrap_or_default();

        Some(Self { url, title, date })
    }
}

/// Parses the read-later RSS into bookmarks, in feed order.
pub fn parse_feed(xml: &str) -> AppResult<Vec<Bookmark>> {
    let parsed = feed_rs::parser::parse(xml.as_bytes())?;
    let bookmarks: Vec<Bookmark> = parsed
        .entries
        .into_iter()
        .filter_map(Bookmark::from_entry)
        .collect();
    log::debug!("Parsed {} bookmarks", bookmarks.len());
    Ok(bookmarks)
}

/// A bookmark as stored by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkDetail {
    #[serde(default)]
    pub comment_raw: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields sent back to the REST API when saving a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkUpdate {
    pub url: String,
    pub comment: String,
    pub tags: Vec<String>,
}

impl BookmarkDetail {
    /// The update that takes this bookmark off the reading list. Other tags
    /// and the rest of the comment are left alone.
    pub fn mark_read(self, url: &str) -> BookmarkUpdate {
        BookmarkUpdate {
            url: url.to_string(),
            comment: self.comment_raw.replace(READ_LATER_MARKER, ""),
            tags: self
                .tags
                .into_iter()
                .filter(|tag| tag != READ_LATER_TAG)
                .collect(),
        }
    }

    pub fn is_read_later(&self) -> bool {
        self.tags.iter().any(|tag| tag == READ_LATER_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns="http://purl.org/rss/1.0/"
         xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://b.hatena.ne.jp/alice/bookmark">
    <title>alice のブックマーク</title>
    <link>https://b.hatena.ne.jp/alice/bookmark</link>
    <description>alice のブックマーク</description>
  </channel>
  <item rdf:about="https://example.com/feed/42">
    <title>Answer</title>
    <link>https://example.com/feed/42</link>
    <dc:date>2024-05-01T09:30:00+09:00</dc:date>
  </item>
  <item rdf:about="https://example.org/post">
    <title>Second post</title>
    <link>https://example.org/post</link>
    <dc:date>2024-04-30T21:00:00+09:00</dc:date>
  </item>
</rdf:RDF>"#;

    #[test]
    fn test_parse_feed_keeps_order_and_links() {
        let bookmarks = parse_feed(FEED).unwrap();
        assert_eq!(bookmarks.len(), 2);
        assert_eq!(bookmarks[0].url, "https://example.com/feed/42");
        assert_eq!(bookmarks[0].title, "Answer");
        assert_eq!(bookmarks[0].date, "2024-05-01 09:30:00+09:00");
        assert_eq!(bookmarks[1].url, "https://example.org/post");
        assert_eq!(bookmarks[1].title, "Second post");
        assert_eq!(bookmarks[1].date, "2024-04-30 21:00:00+09:00");
    }

    #[test]
    fn test_display_date_shifts_utc_to_feed_offset() {
        let utc = DateTime::parse_from_rfc3339("2024-05-01T00:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(display_date(utc), "2024-05-01 09:30:00+09:00");
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(parse_feed("not a feed").is_err());
    }

    #[test]
    fn test_mark_read_strips_marker_and_tag() {
        let detail = BookmarkDetail {
            comment_raw: "[rust][あとで読む]good read".to_string(),
            tags: vec!["rust".to_string(), READ_LATER_TAG.to_string()],
        };
        assert!(detail.is_read_later());

        let update = detail.mark_read("https://example.com/feed/42");
        assert_eq!(update.url, "https://example.com/feed/42");
        assert_eq!(update.comment, "[rust]good read");
        assert_eq!(update.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_mark_read_without_tag_is_unchanged() {
        let detail = BookmarkDetail {
            comment_raw: "plain".to_string(),
            tags: vec!["web".to_string()],
        };
        assert!(!detail.is_read_later());

        let update = detail.mark_read("https://example.org/");
        assert_eq!(update.comment, "plain");
        assert_eq!(update.tags, vec!["web".to_string()]);
    }

    #[test]
    fn test_detail_deserializes_api_payload() {
        let detail: BookmarkDetail = serde_json::from_str(
            r#"{"comment":"good","comment_raw":"[あとで読む]good","tags":["あとで読む"],"private":false}"#,
        )
        .unwrap();
        assert_eq!(detail.comment_raw, "[あとで読む]good");
        assert!(detail.is_read_later());
    }
}
