use crate::types::{CategoryMap, Feed, RelayError, Result, Target};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_UPDATE_INTERVAL: &str = "10m";

/// The configuration document.
///
/// ```json
/// {
///   "feeds": [{"id": "blog", "url": "https://example.com/rss"}],
///   "target": [{"id": "mirror", "url": "https://mirror.example/xmlrpc.php",
///               "blogid": "1", "userid": "admin", "password": "secret"}],
///   "category_map": {"mirror": {"blog": ["news"]}},
///   "preferences": {"update_interval": "1h30m", "postfix": "<p>Read more: {link}</p>"}
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub feeds: Vec<Feed>,
    #[serde(default, rename = "target")]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub category_map: CategoryMap,
    #[serde(default)]
    pub preferences: Preferences,
    /// Accepted for compatibility with older configuration files. Only counted
    /// when checking that at least one source is configured.
    #[serde(default)]
    pub twitter: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preferences {
    #[serde(
        default = "default_update_interval",
        deserialize_with = "string_or_number"
    )]
    pub update_interval: String,
    /// Appended to every relayed body; `{link}` becomes the entry's link.
    #[serde(default)]
    pub postfix: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            postfix: None,
        }
    }
}

fn default_update_interval() -> String {
    DEFAULT_UPDATE_INTERVAL.to_string()
}

impl RunConfig {
    /// Read and validate the configuration document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!(
                "could not open configuration file {} for reading: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_json_str(&raw).map_err(|e| match e {
            RelayError::Config(msg) => {
                RelayError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(raw)
            .map_err(|e| RelayError::Config(format!("failed parsing configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feeds.len() + self.twitter.len() == 0 {
            return Err(RelayError::Config("feed list is empty".to_string()));
        }
        if !self.twitter.is_empty() {
            warn!(
                "Ignoring {} twitter source(s); only feeds are relayed",
                self.twitter.len()
            );
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.id.as_str()) {
                return Err(RelayError::Config(format!("duplicate feed id: {}", feed.id)));
            }
            if !crate::utils::url::is_valid_feed_url(&feed.url) {
                warn!("Feed {} has a suspicious URL: {}", feed.id, feed.url);
            }
        }

        self.interval()?;
        Ok(())
    }

    /// Delay between the end of one cycle and the start of the next.
    pub fn interval(&self) -> Result<Duration> {
        parse_interval(&self.preferences.update_interval)
    }

    pub fn postfix(&self) -> Option<&str> {
        self.preferences.postfix.as_deref()
    }
}

/// Parse an update interval.
///
/// A bare integer is a number of minutes. Anything else is a sequence of
/// `<n>h`, `<n>m` and `<n>s` terms that are summed, so `"1h30m"` is 5400 seconds.
pub fn parse_interval(expr: &str) -> Result<Duration> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(RelayError::Config("update interval is empty".to_string()));
    }

    let invalid = |why: &str| {
        RelayError::Config(format!("invalid update interval {:?}: {}", expr, why))
    };

    if let Ok(minutes) = expr.parse::<u64>() {
        let seconds = minutes
            .checked_mul(60)
            .ok_or_else(|| invalid("too large"))?;
        if seconds == 0 {
            return Err(invalid("must be greater than zero"));
        }
        return Ok(Duration::from_secs(seconds));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in expr.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'h' | 'm' | 's' => {
                if digits.is_empty() {
                    return Err(invalid("unit without a magnitude"));
                }
                let magnitude: u64 = digits.parse().map_err(|_| invalid("too large"))?;
                let unit = match c {
                    'h' => 3600,
                    'm' => 60,
                    _ => 1,
                };
                total = magnitude
                    .checked_mul(unit)
                    .and_then(|secs| total.checked_add(secs))
                    .ok_or_else(|| invalid("too large"))?;
                digits.clear();
            }
            c if c.is_whitespace() && digits.is_empty() => {}
            _ => return Err(invalid("expected terms like 1h, 30m or 45s")),
        }
    }

    if !digits.is_empty() {
        return Err(invalid("trailing magnitude without a unit"));
    }
    if total == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_secs(total))
}

/// Accept either a JSON string or an integer, e.g. `"blogid": 1`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Int(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
    })
}
