//! # IDX News Relay
//!
//! Watches Indonesian capital-market news pages and relays new, relevant
//! headlines to a Telegram channel.
//!
//! ## Features
//!
//! - Polls several listing pages (IDX first) with per-source selector chains
//!   that fall back from specific to generic markup
//! - Keeps only headlines that mention a market keyword
//! - Remembers delivered headlines across restarts in a bounded ledger
//! - Retries oversize or badly formatted messages once with a short template
//! - Falls back to a headless browser when plain HTTP finds nothing
//!
//! ## Usage
//!
//! ```sh
//! TELEGRAM_BOT_TOKEN=123:abc TELEGRAM_CHAT_ID=@idx_news idx_news_relay -c relay.yaml
//! ```
//!
//! ## Architecture
//!
//! Each cycle follows the same pipeline:
//! 1. **Fetching**: Download each source's listing page, one at a time
//! 2. **Extraction**: Apply the source's rule chain and validate candidates
//! 3. **Filtering**: Drop irrelevant headlines and anything already delivered
//! 4. **Delivery**: Send the rest, recording each success in the ledger

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod delivery;
mod error;
mod extract;
mod fetch;
mod ledger;
mod models;
mod orchestrator;
mod pipeline;
mod relevance;
mod sample_log;
mod scheduler;
mod sources;
mod state_lock;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::Settings;
use delivery::{DeliveryEngine, MessageTemplate, TelegramSink};
use error::ConfigError;
use fetch::{BrowserFetcher, HttpFetcher};
use orchestrator::Orchestrator;
use pipeline::{Pipeline, PipelineState, RunOutcome, Trigger};
use relevance::RelevanceFilter;
use scheduler::{Scheduler, manual_trigger, wait_for_termination};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "idx_news_relay starting up");
    debug!(config = ?args.config, once = args.once, "Parsed CLI arguments");

    let settings = match Settings::resolve(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    if let Err(e) = ensure_writable_dir(&settings.state_dir).await {
        error!(
            path = %settings.state_dir.display(),
            error = %e,
            "State directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Build the pipeline ----
    let sources = settings.source_descriptors()?;
    info!(
        count = sources.len(),
        names = %sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", "),
        "Sources loaded"
    );

    let primary = HttpFetcher::new(&settings.user_agent)?;
    let fallback = match &settings.browser {
        Some(browser) => {
            let fetcher = BrowserFetcher::new(
                &browser.url,
                browser.token.as_deref(),
                std::time::Duration::from_secs(browser.timeout_secs),
            )?;
            info!(endpoint = %browser.url, "Browser fallback enabled");
            Some(fetcher)
        }
        None => None,
    };
    let filter = RelevanceFilter::new(&settings.keywords);
    debug!(keywords = filter.keywords().len(), "Relevance filter ready");
    let orchestrator = Orchestrator::new(sources, primary, fallback, filter, settings.source_delay());

    let bot_token = settings
        .telegram
        .bot_token
        .as_deref()
        .ok_or(ConfigError::Missing("telegram.bot_token"))?;
    let chat_id = settings
        .telegram
        .chat_id
        .as_deref()
        .ok_or(ConfigError::Missing("telegram.chat_id"))?;
    let sink = TelegramSink::new(bot_token, chat_id, settings.send_timeout())?
        .with_api_base(&settings.telegram.api_base);
    let delivery = DeliveryEngine::new(
        sink,
        MessageTemplate::new(&settings.hashtags),
        settings.delivery_delay(),
        settings.link_preview,
    );

    let pipeline = Pipeline::new(orchestrator, delivery, PipelineState::from_settings(&settings));

    // ---- Signals ----
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_termination().await;
            info!("Shutdown requested; finishing current step");
            shutdown.cancel();
        });
    }

    // ---- Run ----
    if args.once {
        match pipeline.try_run(Trigger::Manual, &shutdown).await {
            RunOutcome::Completed(summary) => info!(?summary, "Single cycle complete"),
            RunOutcome::Busy => info!("Cycle skipped: another cycle is running"),
        }
    } else {
        let (trigger, manual_rx) = manual_trigger();
        #[cfg(unix)]
        tokio::spawn(scheduler::forward_user_signal(trigger, shutdown.clone()));
        #[cfg(not(unix))]
        drop(trigger);

        Scheduler::new(settings.poll_interval(), settings.startup_delay())
            .run(&pipeline, shutdown.clone(), manual_rx)
            .await;
    }

    shutdown.cancel();
    pipeline.shutdown().await;
    info!("idx_news_relay stopped");
    Ok(())
}
