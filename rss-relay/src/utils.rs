/// URL helpers
pub mod url {
    use url::Url;

    pub fn is_http(url: &Url) -> bool {
        url.scheme() == "http" || url.scheme() == "https"
    }

    /// Validate RSS feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        Url::parse(url_str).map(|u| is_http(&u)).unwrap_or(false)
    }
}

/// Time utilities
pub mod time {
    use std::time::Duration;

    /// Format duration in human-readable form, e.g. `1h30m`
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        if total_seconds == 0 {
            return "0s".to_string();
        }

        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        let mut out = String::new();
        if hours > 0 {
            out.push_str(&format!("{}h", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}m", minutes));
        }
        if seconds > 0 {
            out.push_str(&format!("{}s", seconds));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn feed_urls() {
        assert!(url::is_valid_feed_url("https://example.com/rss"));
        assert!(url::is_valid_feed_url("http://example.com/atom.xml"));
        assert!(!url::is_valid_feed_url("example.com/rss"));
        assert!(!url::is_valid_feed_url("file:///tmp/feed.xml"));
    }

    #[test]
    fn durations() {
        assert_eq!(time::format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(time::format_duration(Duration::from_secs(600)), "10m");
        assert_eq!(time::format_duration(Duration::from_secs(3661)), "1h1m1s");
        assert_eq!(time::format_duration(Duration::ZERO), "0s");
    }
}
