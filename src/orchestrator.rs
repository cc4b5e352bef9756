//! Multi-source fetch orchestration.
//!
//! Sources are polled one after another with a fixed pause between them.
//! A failing source is logged and skipped; it never aborts the run. The items
//! that survive extraction and the relevance filter are merged into a single
//! batch and deduplicated by fingerprint, keeping the first occurrence in
//! registry order.
//!
//! When the primary strategy produces an empty batch and a fallback strategy
//! is configured, the whole pass is repeated with the fallback.

use crate::extract::extract;
use crate::fetch::PageFetcher;
use crate::models::{NewsItem, SourceDescriptor};
use crate::relevance::RelevanceFilter;
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub struct Orchestrator<P, B> {
    sources: Vec<SourceDescriptor>,
    primary: P,
    fallback: Option<B>,
    filter: RelevanceFilter,
    source_delay: Duration,
}

impl<P, B> Orchestrator<P, B>
where
    P: PageFetcher,
    B: PageFetcher,
{
    pub fn new(
        sources: Vec<SourceDescriptor>,
        primary: P,
        fallback: Option<B>,
        filter: RelevanceFilter,
        source_delay: Duration,
    ) -> Self {
        Self {
            sources,
            primary,
            fallback,
            filter,
            source_delay,
        }
    }

    #[cfg(test)]
    pub fn primary_fetcher(&self) -> &P {
        &self.primary
    }

    /// Run one pass over every source and return the deduplicated batch.
    ///
    /// Never fails: if every source fails the batch is simply empty.
    #[instrument(level = "info", skip_all)]
    pub async fn collect(&self, shutdown: &CancellationToken) -> Vec<NewsItem> {
        let batch = self.collect_with(&self.primary, shutdown).await;
        if !batch.is_empty() || shutdown.is_cancelled() {
            return batch;
        }
        match &self.fallback {
            Some(fallback) => {
                info!(strategy = fallback.strategy(), "Primary strategy found nothing; trying fallback");
                self.collect_with(fallback, shutdown).await
            }
            None => batch,
        }
    }

    async fn collect_with<F: PageFetcher>(&self, fetcher: &F, shutdown: &CancellationToken) -> Vec<NewsItem> {
        let mut gathered = Vec::new();
        let mut failed = 0usize;

        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                if shutdown.is_cancelled() {
                    info!(remaining = self.sources.len() - i, "Shutdown requested; skipping remaining sources");
                    break;
                }
                sleep(self.source_delay).await;
            }

            match fetcher.fetch(source).await {
                Ok(html) => {
                    let extracted = extract(&html, source);
                    let total = extracted.len();
                    let relevant: Vec<NewsItem> = extracted
                        .into_iter()
                        .filter(|item| self.filter.is_relevant(&item.title))
                        .collect();
                    info!(
                        source = %source.name,
                        strategy = fetcher.strategy(),
                        extracted = total,
                        relevant = relevant.len(),
                        "Source processed"
                    );
                    gathered.extend(relevant);
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        source = %source.name,
                        strategy = fetcher.strategy(),
                        error = %e,
                        "Source fetch failed; skipping"
                    );
                }
            }
        }

        let before = gathered.len();
        let batch = dedup_batch(gathered);
        info!(
            strategy = fetcher.strategy(),
            sources = self.sources.len(),
            failed,
            gathered = before,
            unique = batch.len(),
            "Collected batch"
        );
        batch
    }
}

/// Collapse items sharing a fingerprint, keeping the first one seen.
pub fn dedup_batch(items: Vec<NewsItem>) -> Vec<NewsItem> {
    items
        .into_iter()
        .unique_by(|item| item.fingerprint.clone())
        .collect()
}
