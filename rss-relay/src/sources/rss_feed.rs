use crate::traits::FeedSource;
use crate::types::{Entry, FetchConfig, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::info;

/// RSS / Atom feed source backed by HTTP.
pub struct RssFeedSource {
    fetcher: Fetcher,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<Entry>> {
        let content = self.fetcher.fetch_feed(url).await?;
        let entries = self.parser.parse_entries(&content)?;

        info!("Pulled {} entries from feed {}", entries.len(), url);
        Ok(entries)
    }
}
