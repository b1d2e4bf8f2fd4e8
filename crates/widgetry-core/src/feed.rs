//! RSS/Atom feed client for the RSS Feed widget class.
//!
//! Fetching goes through the [`FeedSource`] trait so the widget runtime can
//! be tested with canned feeds. The HTTP implementation applies a bounded
//! timeout; a slow or dead feed degrades to the widget's fallback rendering
//! instead of stalling the list-render pipeline.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::error::{WidgetError, WidgetResult};

/// Source of raw feed documents, keyed by URL.
pub trait FeedSource: Send + Sync {
    /// Fetch the feed document at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::ExternalFetch`] when the document cannot be
    /// retrieved. Callers recover with a fallback rendering.
    fn fetch(&self, url: &str) -> WidgetResult<String>;
}

/// [`FeedSource`] backed by a blocking HTTP client with a request timeout.
pub struct HttpFeedSource {
    client: reqwest::blocking::Client,
}

impl HttpFeedSource {
    /// Build a feed source whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> WidgetResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::ExternalFetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, url: &str) -> WidgetResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| WidgetError::ExternalFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WidgetError::ExternalFetch(format!(
                "feed returned status {}",
                response.status()
            )));
        }
        response
            .text()
            .map_err(|e| WidgetError::ExternalFetch(format!("failed to read feed body: {e}")))
    }
}

/// [`FeedSource`] that always returns the same document. For tests and
/// offline use.
pub struct StaticFeedSource {
    body: String,
}

impl StaticFeedSource {
    /// Feed source returning `body` for every URL.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl FeedSource for StaticFeedSource {
    fn fetch(&self, _url: &str) -> WidgetResult<String> {
        Ok(self.body.clone())
    }
}

/// One entry of a parsed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Entry title, if present.
    pub title: Option<String>,
    /// Entry link, if present.
    pub link: Option<String>,
    /// Publication timestamp. Feeds with malformed or missing dates still
    /// produce entries; those sort after dated ones.
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// Parse an RSS 2.0 or Atom document into entries, in document order.
///
/// A document that is not well-formed XML yields no entries; the caller
/// treats that the same as an empty feed.
pub fn parse_feed(xml: &str) -> Vec<FeedEntry> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };
    doc.descendants()
        .filter(|node| {
            node.is_element() && matches!(node.tag_name().name(), "item" | "entry")
        })
        .map(parse_entry)
        .collect()
}

fn parse_entry(node: roxmltree::Node<'_, '_>) -> FeedEntry {
    let mut title = None;
    let mut link = None;
    let mut published = None;
    let mut updated = None;
    for child in node.children().filter(roxmltree::Node::is_element) {
        match child.tag_name().name() {
            "title" => title = text_of(child),
            "link" => {
                // RSS carries the link as text content, Atom as an href
                // attribute.
                link = child
                    .attribute("href")
                    .map(str::to_string)
                    .or_else(|| text_of(child));
            }
            "pubDate" => {
                published = text_of(child)
                    .and_then(|s| DateTime::parse_from_rfc2822(&s).ok());
            }
            "published" => {
                published = text_of(child)
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok());
            }
            "updated" => {
                updated = text_of(child)
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok());
            }
            _ => {}
        }
    }
    FeedEntry {
        title,
        link,
        timestamp: published.or(updated),
    }
}

fn text_of(node: roxmltree::Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Sort entries newest first. Entries without a timestamp sort last, in their
/// original relative order.
pub fn sort_entries_desc(entries: &mut [FeedEntry]) {
    entries.sort_by(|a, b| match (&a.timestamp, &b.timestamp) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Display format for entry timestamps: `07/04 09:30AM`.
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%m/%d %I:%M%p").to_string()
}
