//! In-memory fetchers and sinks for unit tests.

use crate::delivery::{MessageSink, ParseMode};
use crate::error::{FetchError, SendError};
use crate::fetch::PageFetcher;
use crate::models::{ExtractionRule, NewsItem, SourceDescriptor};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// A source named `name` with a single `article` rule.
pub fn source(name: &str) -> SourceDescriptor {
    let base = Url::parse(&format!("https://{}.example/", name.to_lowercase())).unwrap();
    SourceDescriptor {
        name: name.to_string(),
        url: base.join("berita/").unwrap(),
        base_url: base,
        rules: vec![ExtractionRule::new("article").unwrap()],
        timeout: Duration::from_secs(10),
    }
}

/// A listing page with one `<article><a href>title</a></article>` per entry.
pub fn listing(entries: &[(&str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(href, title)| format!(r#"<article><a href="{href}">{title}</a></article>"#))
        .collect();
    format!("<html><body><main>{body}</main></body></html>")
}

pub fn news_item(title: &str) -> NewsItem {
    NewsItem::new(
        title.to_string(),
        Url::parse("https://www.idx.co.id/berita/1").unwrap(),
        "IDX",
        None,
    )
}

#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, source: &str, html: String) -> Self {
        self.pages.insert(source.to_string(), Ok(html));
        self
    }

    pub fn with_error(mut self, source: &str, err: FetchError) -> Self {
        self.pages.insert(source.to_string(), Err(err));
        self
    }

    /// Source names fetched so far, with the (paused-clock) time of each call.
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PageFetcher for MockFetcher {
    fn strategy(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.name.clone(), Instant::now()));
        self.pages
            .get(&source.name)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// Records every message; replies from a script, then `Ok(())`.
#[derive(Default)]
pub struct MockSink {
    script: Mutex<VecDeque<Result<(), SendError>>>,
    sent: Mutex<Vec<(String, ParseMode)>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, replies: Vec<Result<(), SendError>>) -> Self {
        *self.script.lock().unwrap() = replies.into();
        self
    }

    pub fn sent(&self) -> Vec<(String, ParseMode)> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageSink for MockSink {
    async fn send_message(&self, text: &str, mode: ParseMode, _link_preview: bool) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((text.to_string(), mode));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
