use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::string_or_number;

/// A syndication feed to poll. The id keys the persisted watermark.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
}

/// A MetaWeblog endpoint that receives relayed posts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    pub id: String,
    pub url: String,
    #[serde(rename = "blogid", deserialize_with = "string_or_number")]
    pub blog_id: String,
    #[serde(rename = "userid")]
    pub user_id: String,
    pub password: String,
}

/// targetId -> feedId -> category names
pub type CategoryMap = HashMap<String, HashMap<String, Vec<String>>>;

/// One entry as returned by a feed source, newest-first within its feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub guid: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub body: String,
    pub link: String,
}

/// An entry selected for delivery during the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub feed_id: String,
    pub guid: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// The struct handed to `metaWeblog.newPost` for a single target.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPayload {
    pub title: String,
    pub description: String,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rss-relay/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 30,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("XML-RPC error: {0}")]
    XmlRpc(String),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
