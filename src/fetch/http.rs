//! Primary fetch strategy: a plain HTTP GET with browser-like headers.

use super::PageFetcher;
use crate::error::FetchError;
use crate::models::SourceDescriptor;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{debug, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7";

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Accept only 2xx responses that are HTML (or carry no content type).
pub fn check_response(status: u16, content_type: Option<&str>) -> Result<(), FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::Status(status));
    }
    match content_type {
        Some(ct) if !is_html(ct) => Err(FetchError::ContentType(ct.to_string())),
        _ => Ok(()),
    }
}

impl PageFetcher for HttpFetcher {
    fn strategy(&self) -> &'static str {
        "http"
    }

    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(source.url.clone())
            .timeout(source.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, source.timeout))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        check_response(status, content_type.as_deref())?;

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, source.timeout))?;
        debug!(bytes = body.len(), status, "Fetched listing page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_html() {
        assert!(check_response(200, Some("text/html; charset=UTF-8")).is_ok());
        assert!(check_response(204, Some("application/xhtml+xml")).is_ok());
        assert!(check_response(200, None).is_ok());
    }

    #[test]
    fn test_rejects_non_success_status() {
        assert_eq!(
            check_response(404, Some("text/html")),
            Err(FetchError::Status(404))
        );
        assert_eq!(check_response(302, None), Err(FetchError::Status(302)));
    }

    #[test]
    fn test_rejects_non_html_content() {
        assert_eq!(
            check_response(200, Some("application/json")),
            Err(FetchError::ContentType("application/json".to_string()))
        );
    }

    #[test]
    fn test_client_builds() {
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        assert_eq!(fetcher.strategy(), "http");
    }
}
