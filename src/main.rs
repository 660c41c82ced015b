//! # UA Alert Bot
//!
//! Relays Ukrainian news and air-raid alert changes to one Telegram chat.
//!
//! ## Features
//!
//! - Walks ukr.net category pages, follows each story to its publisher and
//!   posts title, summary, image and video link
//! - Remembers every posted article in SQLite, so restarts never repeat news
//! - Polls the alerts.in.ua regional feed and announces alerts that start or
//!   end, grouped per direction
//!
//! ## Usage
//!
//! ```sh
//! BOT_TOKEN=123:abc CHAT_ID=@my_channel ALERTS_TOKEN=xyz ua_alert_bot
//! ```
//!
//! ## Architecture
//!
//! Two independent loops share one notifier and one state store:
//! 1. **News** every `NEWS_INTERVAL`: discover → resolve → dedup → extract →
//!    post → remember, at most `MAX_NEWS_PER_CYCLE` posts per run
//! 2. **Alerts** every `ALERTS_INTERVAL`: fetch line → diff with stored line
//!    → store → announce

use clap::Parser;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod alerts;
mod cli;
mod config;
mod error;
mod http;
mod models;
mod news;
mod scheduler;
mod scrapers;
mod store;
mod telegram;
mod utils;

use alerts::{AlertTracker, AlertsClient};
use cli::Cli;
use config::{Settings, normalize_chat_id};
use error::{Error, Result};
use http::HttpFetcher;
use news::NewsCycle;
use scheduler::Scheduler;
use store::StateStore;
use telegram::{Notifier, TelegramNotifier};

const STARTUP_MESSAGE: &str = "✅ Бот запущено. Пішов робочий режим.";

#[tokio::main]
async fn main() -> Result<()> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    if let Err(e) = run(args).await {
        error!(error = %e, "Bot stopped");
        return Err(e);
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "ua_alert_bot starting up");

    // --- Configuration: any problem here is fatal ---
    if args.bot_token.trim().is_empty() {
        return Err(Error::Config("BOT_TOKEN is not set".into()));
    }
    let chat_id = args
        .chat_id_raw()
        .map(|raw| normalize_chat_id(&raw))
        .ok_or_else(|| Error::Config("CHAT_ID is not set".into()))?;
    if args.news_interval == 0 || args.alerts_interval == 0 {
        return Err(Error::Config("intervals must be at least one second".into()));
    }
    let settings = Settings::load(args.config.as_deref())?;
    info!(
        %chat_id,
        news_interval_secs = args.news_interval,
        alerts_interval_secs = args.alerts_interval,
        max_news_per_cycle = args.max_news_per_cycle,
        pages = settings.listing_pages.len(),
        "Configuration loaded"
    );

    // --- State and collaborators ---
    let store = StateStore::open(&args.db_path).await?;
    info!(path = %args.db_path.display(), "State store opened");

    let fetcher = HttpFetcher::new(&settings)?;
    let notifier = TelegramNotifier::new(fetcher.client().clone(), args.bot_token.trim(), chat_id);

    let feed = match args.alerts_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => Some(AlertsClient::new(
            fetcher.client().clone(),
            settings.alerts_url.clone(),
            token,
        )),
        _ => {
            warn!("ALERTS_TOKEN is not set; alert cycle disabled");
            None
        }
    };

    if !args.no_startup_message {
        if let Err(e) = notifier.send_text(STARTUP_MESSAGE, true).await {
            warn!(error = %e, "Startup message failed; continuing");
        }
    }

    let news = NewsCycle {
        fetcher: &fetcher,
        notifier: &notifier,
        store: &store,
        settings: &settings,
        quota: args.max_news_per_cycle,
    };
    let tracker = feed.as_ref().map(|feed| AlertTracker {
        feed,
        notifier: &notifier,
        store: &store,
        regions: &settings.regions,
    });
    let scheduler = Scheduler {
        news_interval: args.news_interval(),
        alerts_interval: args.alerts_interval(),
    };

    info!("Bot started");
    tokio::select! {
        _ = scheduler.run(&news, tracker.as_ref()) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                return Err(e.into());
            }
            info!("Interrupt received; shutting down");
        }
    }
    Ok(())
}
