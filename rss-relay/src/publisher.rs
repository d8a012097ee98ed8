use crate::traits::BlogClient;
use crate::types::{CategoryMap, Post, PostPayload, Result, Target};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A configured target together with the client that reaches it.
pub struct TargetClient {
    pub target: Target,
    pub client: Box<dyn BlogClient>,
}

impl TargetClient {
    pub fn new(target: Target, client: Box<dyn BlogClient>) -> Self {
        Self { target, client }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetReport {
    pub target_id: String,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub targets: Vec<TargetReport>,
    /// Publishing stopped early because cancellation was requested.
    pub aborted: bool,
}

impl PublishReport {
    pub fn delivered(&self) -> usize {
        self.targets.iter().map(|t| t.delivered).sum()
    }

    pub fn failed(&self) -> usize {
        self.targets.iter().map(|t| t.failed).sum()
    }
}

/// Delivers an ordered batch of posts to every target.
pub struct Publisher<'a> {
    clients: &'a [TargetClient],
    category_map: &'a CategoryMap,
}

impl<'a> Publisher<'a> {
    pub fn new(clients: &'a [TargetClient], category_map: &'a CategoryMap) -> Self {
        Self {
            clients,
            category_map,
        }
    }

    /// Categories configured for posts of `feed_id` on `target_id`, if any.
    pub fn categories(&self, target_id: &str, feed_id: &str) -> Option<&'a [String]> {
        self.category_map
            .get(target_id)
            .and_then(|feeds| feeds.get(feed_id))
            .map(Vec::as_slice)
    }

    pub fn payload_for(&self, target: &Target, post: &Post) -> PostPayload {
        PostPayload {
            title: post.title.clone(),
            description: post.body.clone(),
            categories: self
                .categories(&target.id, &post.feed_id)
                .map(<[String]>::to_vec),
        }
    }

    pub async fn submit(&self, target_client: &TargetClient, post: &Post) -> Result<String> {
        let target = &target_client.target;
        let payload = self.payload_for(target, post);
        target_client
            .client
            .new_post(
                &target.blog_id,
                &target.user_id,
                &target.password,
                &payload,
                true,
            )
            .await
    }

    /// Send every post to every target, in batch order.
    ///
    /// A failed submission is logged and skipped; it never stops the remaining
    /// posts or targets. Cancellation is checked before each submission.
    pub async fn publish(&self, posts: &[Post], cancel: &CancellationToken) -> PublishReport {
        let mut report = PublishReport::default();

        for target_client in self.clients {
            let target_id = &target_client.target.id;
            let mut target_report = TargetReport {
                target_id: target_id.clone(),
                ..Default::default()
            };

            for post in posts {
                if cancel.is_cancelled() {
                    warn!("Interrupted while publishing to {}", target_id);
                    report.targets.push(target_report);
                    report.aborted = true;
                    return report;
                }

                match self.submit(target_client, post).await {
                    Ok(post_id) => {
                        target_report.delivered += 1;
                        info!(
                            "successfully posted {} into {} (post id {})",
                            post.title, target_id, post_id
                        );
                    }
                    Err(e) => {
                        target_report.failed += 1;
                        error!("failed posting {} into {}: {}", post.title, target_id, e);
                    }
                }
            }

            report.targets.push(target_report);
        }

        report
    }
}
