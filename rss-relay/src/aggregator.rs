use crate::poller::FeedPollResult;
use crate::types::{Entry, Post};
use tracing::debug;

pub const LINK_PLACEHOLDER: &str = "{link}";

/// Merges every feed's new entries into one chronologically ordered batch.
///
/// All targets receive the same batch, so relative order across feeds is
/// identical everywhere.
#[derive(Debug, Default, Clone)]
pub struct PostAggregator {
    postfix: Option<String>,
}

impl PostAggregator {
    pub fn new(postfix: Option<&str>) -> Self {
        Self {
            postfix: postfix.map(str::to_string),
        }
    }

    pub fn aggregate(&self, polls: Vec<FeedPollResult>) -> Vec<Post> {
        let mut posts = self.merge(polls);
        order(&mut posts);
        debug!("Aggregated {} post(s) for delivery", posts.len());
        posts
    }

    /// Flatten per-feed entries into posts tagged with their feed id,
    /// preserving feed order and then entry order.
    pub fn merge(&self, polls: Vec<FeedPollResult>) -> Vec<Post> {
        polls
            .into_iter()
            .flat_map(|poll| {
                let feed_id = poll.feed_id;
                poll.new_entries
                    .into_iter()
                    .map(move |entry| (feed_id.clone(), entry))
            })
            .map(|(feed_id, entry)| self.to_post(feed_id, entry))
            .collect()
    }

    fn to_post(&self, feed_id: String, entry: Entry) -> Post {
        let body = match &self.postfix {
            Some(template) => apply_postfix(&entry.body, &entry.link, template),
            None => entry.body,
        };

        Post {
            feed_id,
            guid: entry.guid,
            title: entry.title,
            body,
            link: entry.link,
            published_at: entry.published_at,
        }
    }
}

/// Append `template` to `body`, substituting the entry link for `{link}`.
pub fn apply_postfix(body: &str, link: &str, template: &str) -> String {
    format!("{}{}", body, template.replace(LINK_PLACEHOLDER, link))
}

/// Stable ascending sort by publish time; undated posts go first in merge order.
pub fn order(posts: &mut [Post]) {
    posts.sort_by_key(|post| post.published_at);
}
