use anyhow::Context;
use clap::Parser;
use rss_relay::{
    connect_targets, CycleOutcome, FetchConfig, GuidStore, RssFeedSource, RunConfig, RunContext,
    RunOutcome, SchedulerLoop,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "rss-relay",
    version,
    about = "Relay new RSS/Atom entries to MetaWeblog blogs"
)]
struct Cli {
    /// Configuration document
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Watermark file of already relayed GUIDs
    #[arg(long, default_value = "guids.json")]
    guids: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = RunConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let interval = config.interval()?;

    let fetch_config = FetchConfig::default();
    let store = GuidStore::load(&cli.guids, &config.feeds);
    let clients = connect_targets(&config.targets, &fetch_config);
    let source = RssFeedSource::new(fetch_config).context("building HTTP client")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut scheduler = SchedulerLoop::new(RunContext {
        config,
        interval,
        store,
        source: Box::new(source),
        clients,
        cancel,
    });

    if cli.once {
        if !scheduler.has_targets() {
            return Ok(ExitCode::SUCCESS);
        }
        return Ok(match scheduler.run_once().await {
            CycleOutcome::Completed { .. } => ExitCode::SUCCESS,
            CycleOutcome::Aborted => ExitCode::FAILURE,
        });
    }

    Ok(match scheduler.run().await {
        RunOutcome::NoTargets | RunOutcome::Stopped => ExitCode::SUCCESS,
        RunOutcome::Aborted => ExitCode::FAILURE,
    })
}

/// Ctrl-C requests a stop; the loop notices it at the next feed or post boundary.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT, finishing the current call and stopping");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for SIGINT: {}", e),
        }
    });
}

/// Initialize tracing according to RUST_LOG (default `info`) and
/// RELAY_LOG_FORMAT (`json` for JSON lines, anything else for compact text).
fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);
    let builder = tracing_subscriber::registry().with(filter);

    match std::env::var("RELAY_LOG_FORMAT").as_deref() {
        Ok("json") => {
            let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
        }
        _ => {
            let _ = builder.with(fmt_layer.compact()).try_init();
        }
    }
}
