//! Delivery of new headlines to the output channel.
//!
//! Items are sent one at a time, in batch order, with a fixed pause between
//! sends to stay under the channel's rate limits. Each item gets at most two
//! attempts:
//!
//! | First attempt fails with | Second attempt |
//! |--------------------------|----------------|
//! | [`SendError::SizeExceeded`] | short template, same parse mode |
//! | [`SendError::FormatInvalid`] | short template, plain text |
//! | anything else | none |
//!
//! Only delivered items are written to the ledger. A failed item stays
//! eligible and is retried on the next run.

pub mod telegram;
pub mod template;

use crate::error::SendError;
use crate::ledger::Ledger;
use crate::models::NewsItem;
use crate::utils::truncate_chars;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

pub use telegram::TelegramSink;
pub use template::MessageTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

/// An output channel that accepts formatted text messages.
pub trait MessageSink {
    async fn send_message(&self, text: &str, mode: ParseMode, link_preview: bool) -> Result<(), SendError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Sent,
    /// Delivered with the short template after the full one was rejected.
    SentShortened,
    Failed(SendError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent | DeliveryOutcome::SentShortened)
    }
}

#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<(NewsItem, DeliveryOutcome)>,
    /// Items left unsent because shutdown was requested.
    pub deferred: usize,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

pub struct DeliveryEngine<S> {
    sink: S,
    template: MessageTemplate,
    delay: Duration,
    link_preview: bool,
}

impl<S: MessageSink> DeliveryEngine<S> {
    pub fn new(sink: S, template: MessageTemplate, delay: Duration, link_preview: bool) -> Self {
        Self {
            sink,
            template,
            delay,
            link_preview,
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Send every item, marking each successful one in `ledger`.
    ///
    /// Shutdown is checked before each item; an in-flight send is allowed to
    /// finish and the remaining items are counted as deferred.
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn deliver(
        &self,
        items: Vec<NewsItem>,
        ledger: &mut Ledger,
        shutdown: &CancellationToken,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let total = items.len();

        for (i, item) in items.into_iter().enumerate() {
            if shutdown.is_cancelled() {
                report.deferred = total - i;
                info!(deferred = report.deferred, "Shutdown requested; deferring remaining items");
                break;
            }
            if i > 0 {
                sleep(self.delay).await;
            }

            let outcome = self.deliver_one(&item).await;
            if outcome.is_delivered() {
                ledger.mark_delivered(&item);
            }
            report.outcomes.push((item, outcome));
        }

        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            deferred = report.deferred,
            "Delivery batch finished"
        );
        report
    }

    async fn deliver_one(&self, item: &NewsItem) -> DeliveryOutcome {
        let title = truncate_chars(&item.title, 60);
        let full = self.template.render_full(item);

        let retry_mode = match self.sink.send_message(&full, ParseMode::Html, self.link_preview).await {
            Ok(()) => {
                info!(%title, source = %item.source, "Delivered");
                return DeliveryOutcome::Sent;
            }
            Err(SendError::SizeExceeded(reason)) => {
                warn!(%title, %reason, "Message too long; retrying with short template");
                ParseMode::Html
            }
            Err(SendError::FormatInvalid(reason)) => {
                warn!(%title, %reason, "Formatting rejected; retrying as plain text");
                ParseMode::Plain
            }
            Err(e) => {
                error!(%title, error = %e, "Delivery failed; will retry next run");
                return DeliveryOutcome::Failed(e);
            }
        };

        let short = self.template.render_short(item, retry_mode);
        match self.sink.send_message(&short, retry_mode, self.link_preview).await {
            Ok(()) => {
                info!(%title, source = %item.source, "Delivered with short template");
                DeliveryOutcome::SentShortened
            }
            Err(e) => {
                error!(%title, error = %e, "Short template also failed; will retry next run");
                DeliveryOutcome::Failed(e)
            }
        }
    }
}
