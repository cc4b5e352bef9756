//! Page retrieval strategies.
//!
//! The orchestrator does not care how a listing page is obtained, only that
//! the result is the page's HTML. Two strategies implement [`PageFetcher`]:
//!
//! | Strategy | Module | Notes |
//! |----------|--------|-------|
//! | Plain HTTP | [`http`] | Primary; browser-like headers, per-source timeout |
//! | Headless browser | [`browser`] | Fallback through a Browserless `/content` endpoint |

pub mod browser;
pub mod http;

use crate::error::FetchError;
use crate::models::SourceDescriptor;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

/// Something that can turn a [`SourceDescriptor`] into raw HTML.
pub trait PageFetcher {
    /// Short name used in logs.
    fn strategy(&self) -> &'static str;

    /// Fetch the source's listing page.
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, FetchError>;
}
