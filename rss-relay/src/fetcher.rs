use crate::types::{FetchConfig, RelayError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Plain HTTP GET of feed documents. No retries: a failed fetch fails the
/// feed for this cycle and it is picked up again on the next one.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(RelayError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = as_mb(content_length);
            if size_mb > self.config.max_feed_size_mb {
                return Err(RelayError::FeedTooLarge { size_mb });
            }
        }

        let content = response.bytes().await?;
        let size_mb = as_mb(content.len() as u64);
        if size_mb > self.config.max_feed_size_mb {
            return Err(RelayError::FeedTooLarge { size_mb });
        }

        info!(
            "Fetched feed: {} ({} bytes in {} ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content.to_vec())
    }
}

fn as_mb(len: u64) -> usize {
    (len / (1024 * 1024)) as usize
}
