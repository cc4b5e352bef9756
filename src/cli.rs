//! Command-line interface definitions for the IDX news relay.
//!
//! Every option can also come from an environment variable, and most have a
//! counterpart in the YAML settings file. Flags win over the file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the IDX news relay.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, everything else default
/// TELEGRAM_BOT_TOKEN=123:abc TELEGRAM_CHAT_ID=@idx_news idx_news_relay
///
/// # Settings file plus a single cycle, useful from cron
/// idx_news_relay -c relay.yaml --once
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "NEWS_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Target chat or channel (numeric id or @username)
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub chat_id: Option<String>,

    /// Seconds between scheduled cycles
    #[arg(short, long, env = "POLL_INTERVAL_SECS")]
    pub interval: Option<u64>,

    /// Directory holding the delivery ledger and sample log
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Run one cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Verbose logging (ignored when RUST_LOG is set)
    #[arg(short, long, env = "DEBUG")]
    pub debug: bool,
}
