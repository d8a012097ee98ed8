use crate::traits::FeedSource;
use crate::types::{Entry, Feed, Result};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// What one feed contributed to the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPollResult {
    pub feed_id: String,
    /// Entries not covered by the previous watermark, newest first.
    pub new_entries: Vec<Entry>,
    /// Replacement watermark, or `None` when the fetch failed and the
    /// previous watermark must be kept.
    pub watermark: Option<Vec<String>>,
    pub error: Option<String>,
}

impl FeedPollResult {
    fn failed(feed_id: &str, error: String) -> Self {
        Self {
            feed_id: feed_id.to_string(),
            new_entries: Vec::new(),
            watermark: None,
            error: Some(error),
        }
    }
}

pub struct FeedPoller<'a> {
    source: &'a dyn FeedSource,
}

impl<'a> FeedPoller<'a> {
    pub fn new(source: &'a dyn FeedSource) -> Self {
        Self { source }
    }

    pub async fn fetch(&self, feed: &Feed) -> Result<Vec<Entry>> {
        self.source.fetch_entries(&feed.url).await
    }

    /// Fetch `feed` and split off the entries newer than `watermark`.
    /// A fetch failure is logged and reported in the result; it never propagates.
    pub async fn poll(&self, feed: &Feed, watermark: &[String]) -> FeedPollResult {
        let entries = match self.fetch(feed).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Malformed or unreachable feed {} ({}): {}", feed.id, feed.url, e);
                return FeedPollResult::failed(&feed.id, e.to_string());
            }
        };

        if !is_newest_first(&entries) {
            warn!(
                "Feed {} is not ordered newest-first; entries may be skipped or delivered twice",
                feed.id
            );
        }

        let (new_entries, new_watermark) = diff_new(entries, watermark);
        if new_entries.is_empty() {
            debug!("Feed {}: nothing new", feed.id);
        } else {
            info!("Feed {}: {} new entries", feed.id, new_entries.len());
        }

        FeedPollResult {
            feed_id: feed.id.clone(),
            new_entries,
            watermark: Some(new_watermark),
            error: None,
        }
    }
}

/// Split newest-first `entries` against the previous `watermark`.
///
/// Scanning stops at the first GUID already in the watermark; everything
/// from there on is assumed delivered. The returned watermark holds the GUIDs
/// of the new entries followed by that boundary GUID, which keeps an unchanged
/// feed deduplicated on the next cycle.
pub fn diff_new(entries: Vec<Entry>, watermark: &[String]) -> (Vec<Entry>, Vec<String>) {
    let seen: HashSet<&str> = watermark.iter().map(String::as_str).collect();
    let mut new_entries = Vec::new();
    let mut new_watermark = Vec::new();

    for entry in entries {
        new_watermark.push(entry.guid.clone());
        if seen.contains(entry.guid.as_str()) {
            break;
        }
        new_entries.push(entry);
    }

    (new_entries, new_watermark)
}

/// True when no entry carries a timestamp newer than an entry before it.
pub fn is_newest_first(entries: &[Entry]) -> bool {
    entries
        .iter()
        .filter_map(|e| e.published_at)
        .collect::<Vec<_>>()
        .windows(2)
        .all(|pair| pair[0] >= pair[1])
}
