//! Fallback fetch strategy: render the page in a headless browser.
//!
//! Talks to a Browserless-compatible service: `POST {base}/content` with a
//! JSON body `{"url": ...}` returns the fully rendered HTML. Used when the
//! plain HTTP strategy yields nothing, typically because a listing is built
//! client-side.

use super::PageFetcher;
use crate::error::FetchError;
use crate::models::SourceDescriptor;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct BrowserFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for BrowserFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserFetcher")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BrowserFetcher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
        })
    }

    fn content_endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}

impl PageFetcher for BrowserFetcher {
    fn strategy(&self) -> &'static str {
        "browser"
    }

    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, FetchError> {
        let body = serde_json::json!({ "url": source.url.as_str() });

        let resp = self
            .client
            .post(self.content_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Browser {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;
        debug!(bytes = html.len(), "Rendered listing page");
        Ok(html)
    }
}
