use crate::types::{Entry, RelayError, Result};
use feed_rs::parser;
use tracing::debug;

/// Turns RSS / Atom / JSON Feed documents into [`Entry`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed document, keeping entries in document order.
    pub fn parse_entries(&self, content: &[u8]) -> Result<Vec<Entry>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| RelayError::Parse(format!("Failed to parse feed: {}", e)))?;

        let entries: Vec<Entry> = feed.entries.into_iter().map(Self::parse_entry).collect();
        debug!("Parsed feed with {} entries", entries.len());
        Ok(entries)
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> Entry {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        // Prefer full content over the summary
        let body = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        let published_at = entry.published.or(entry.updated);

        Entry {
            guid: entry.id,
            title,
            published_at,
            body,
            link,
        }
    }
}
