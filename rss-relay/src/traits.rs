use crate::types::{Entry, PostPayload, Result};
use async_trait::async_trait;

/// Trait for pulling entries from a syndication feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`.
    /// Entries come back in document order, which is expected to be newest-first.
    /// Any failure (unreachable host, bad status, malformed document) fails the whole feed.
    async fn fetch_entries(&self, url: &str) -> Result<Vec<Entry>>;
}

/// Trait for the remote blog a post is published to.
#[async_trait]
pub trait BlogClient: Send + Sync {
    /// Endpoint this client talks to, for logging.
    fn endpoint(&self) -> &str;

    /// Create a post and return the id the remote assigned to it.
    async fn new_post(
        &self,
        blog_id: &str,
        user_id: &str,
        password: &str,
        payload: &PostPayload,
        publish: bool,
    ) -> Result<String>;
}
