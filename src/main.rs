//! wex-notifier binary entrypoint.
//! Connects to reddit and the subscription store, then polls the subreddit
//! on a fixed interval until Ctrl-C.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wex_notifier::config::{NotifierSettings, Settings, StoreSettings};
use wex_notifier::ingest::providers::reddit::RedditSource;
use wex_notifier::metrics::Metrics;
use wex_notifier::notify::{email::EmailNotifier, log::LogNotifier, Notifier, NotifierMux};
use wex_notifier::scheduler::{self, PollSchedulerCfg};
use wex_notifier::subscriptions::{
    file::FileSubscriptionStore, mongo::MongoSubscriptionStore, SubscriptionStore,
};
use wex_notifier::FetchCycle;

/// `LOG_FORMAT=json` switches to JSON lines; anything else is compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wex_notifier=info,poll=info,notify=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn build_store(settings: &Settings) -> Result<Box<dyn SubscriptionStore>> {
    let store: Box<dyn SubscriptionStore> = match &settings.store {
        StoreSettings::Mongo(cfg) => Box::new(
            MongoSubscriptionStore::connect(cfg)
                .await
                .context("connecting to the subscription database")?,
        ),
        StoreSettings::File(path) => Box::new(FileSubscriptionStore::open(path)?),
    };
    Ok(store)
}

fn build_notifier(settings: &Settings) -> Result<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match &settings.notifier {
        NotifierSettings::Log => Box::new(LogNotifier),
        NotifierSettings::Email(smtp) => Box::new(
            NotifierMux::new()
                .with(LogNotifier)
                .with(EmailNotifier::new(smtp, settings.subreddit.clone())?),
        ),
    };
    Ok(notifier)
}

async fn run() -> Result<()> {
    let settings = Settings::load().context("loading configuration")?;

    let source = RedditSource::new(settings.subreddit.clone(), settings.reddit.clone())?;
    source.probe().await.context("connecting to reddit")?;
    tracing::info!(subreddit = source.subreddit(), "connected to reddit");

    let store = build_store(&settings).await?;
    let notifier = build_notifier(&settings)?;

    let _metrics_task = match settings.metrics_addr {
        Some(addr) => Some(Metrics::init()?.serve(addr).await?),
        None => None,
    };

    let cycle = FetchCycle::new(Box::new(source), store, notifier, settings.num_posts);
    let cfg = PollSchedulerCfg {
        interval: settings.poll_interval,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler failed; running until killed");
            std::future::pending::<()>().await;
        }
    };
    scheduler::run_until(cycle, cfg, shutdown).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            eprintln!("wex-notifier: {e:#}");
            ExitCode::FAILURE
        }
    }
}
