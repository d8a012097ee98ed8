use crate::aggregator::PostAggregator;
use crate::config::RunConfig;
use crate::guid_store::GuidStore;
use crate::poller::FeedPoller;
use crate::publisher::{PublishReport, Publisher, TargetClient};
use crate::traits::FeedSource;
use crate::utils::time::format_duration;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything a run needs, built once at startup and owned by the loop.
pub struct RunContext {
    pub config: RunConfig,
    pub interval: Duration,
    pub store: GuidStore,
    pub source: Box<dyn FeedSource>,
    pub clients: Vec<TargetClient>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        posts: usize,
        report: PublishReport,
        /// False when the watermark file could not be written.
        committed: bool,
    },
    /// Cancellation was observed; nothing was committed.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No usable target, so no cycle was started.
    NoTargets,
    /// Cancelled between cycles.
    Stopped,
    /// Cancelled in the middle of a cycle.
    Aborted,
}

pub struct SchedulerLoop {
    ctx: RunContext,
}

impl SchedulerLoop {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    /// Whether at least one target is usable. Logs when none is.
    pub fn has_targets(&self) -> bool {
        if self.ctx.clients.is_empty() {
            error!("no available target.");
            return false;
        }
        true
    }

    /// Run cycles until cancelled.
    pub async fn run(&mut self) -> RunOutcome {
        if !self.has_targets() {
            return RunOutcome::NoTargets;
        }

        info!(
            "Relaying {} feed(s) to {} target(s) every {}",
            self.ctx.config.feeds.len(),
            self.ctx.clients.len(),
            format_duration(self.ctx.interval)
        );

        loop {
            if let CycleOutcome::Aborted = self.run_once().await {
                return RunOutcome::Aborted;
            }

            info!("Next cycle in {}", format_duration(self.ctx.interval));
            tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => {
                    info!("Interrupted while sleeping, stopping");
                    return RunOutcome::Stopped;
                }
                _ = tokio::time::sleep(self.ctx.interval) => {}
            }
        }
    }

    /// Run one poll → aggregate → publish → commit cycle.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let span = info_span!("cycle", id = %Uuid::new_v4());
        self.cycle().instrument(span).await
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let ctx = &mut self.ctx;
        let poller = FeedPoller::new(ctx.source.as_ref());

        let mut polls = Vec::with_capacity(ctx.config.feeds.len());
        for feed in &ctx.config.feeds {
            if ctx.cancel.is_cancelled() {
                warn!("Interrupted before polling {}, discarding cycle", feed.id);
                ctx.store.discard_staged();
                return CycleOutcome::Aborted;
            }

            let result = poller.poll(feed, ctx.store.watermark(&feed.id)).await;
            if let Some(watermark) = &result.watermark {
                ctx.store.stage(&feed.id, watermark.clone());
            }
            polls.push(result);
        }

        let posts = PostAggregator::new(ctx.config.postfix()).aggregate(polls);

        let report = Publisher::new(&ctx.clients, &ctx.config.category_map)
            .publish(&posts, &ctx.cancel)
            .await;
        if report.aborted {
            warn!("Interrupted while publishing, discarding cycle");
            ctx.store.discard_staged();
            return CycleOutcome::Aborted;
        }

        let committed = match ctx.store.commit_all().await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed writing watermarks to {}: {}",
                    ctx.store.path().display(),
                    e
                );
                false
            }
        };

        info!(
            "Cycle finished: {} new post(s), {} delivered, {} failed",
            posts.len(),
            report.delivered(),
            report.failed()
        );

        CycleOutcome::Completed {
            posts: posts.len(),
            report,
            committed,
        }
    }
}
