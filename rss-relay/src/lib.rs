pub mod aggregator;
pub mod config;
pub mod fetcher;
pub mod guid_store;
pub mod metaweblog;
pub mod parser;
pub mod poller;
pub mod publisher;
pub mod scheduler;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;
pub mod xmlrpc;

pub use aggregator::PostAggregator;
pub use config::RunConfig;
pub use fetcher::Fetcher;
pub use guid_store::{GuidSnapshot, GuidStore};
pub use metaweblog::{connect_targets, MetaWeblogClient};
pub use parser::FeedParser;
pub use poller::{FeedPollResult, FeedPoller};
pub use publisher::{PublishReport, Publisher, TargetClient};
pub use scheduler::{CycleOutcome, RunContext, RunOutcome, SchedulerLoop};
pub use sources::RssFeedSource;
pub use traits::{BlogClient, FeedSource};
pub use types::*;
