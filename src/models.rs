//! Data models shared by every pipeline stage.
//!
//! - [`SourceDescriptor`]: an immutable description of one news source
//! - [`ExtractionRule`]: one entry in a source's selector fallback chain
//! - [`RawCandidate`]: what a rule pulls out of a single matched element
//! - [`NewsItem`]: the normalized unit that flows through filter, ledger and
//!   delivery

use crate::error::SelectorError;
use crate::ledger::fingerprint;
use chrono::{DateTime, Local};
use scraper::Selector;
use std::time::Duration;
use url::Url;

/// Compile a CSS selector, keeping the source text for error reporting.
pub fn compile_selector(css: &str) -> Result<Selector, SelectorError> {
    Selector::parse(css).map_err(|e| SelectorError {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// One step of a source's extraction fallback chain.
///
/// `item` locates candidate headline elements in the document. The optional
/// selectors are evaluated relative to each matched element:
///
/// * `title`: element holding the headline text (default: the element itself)
/// * `link`: element carrying the `href` (default: the element itself when it
///   has an `href`, otherwise its first descendant `a[href]`)
/// * `date`: element holding a publication date string (default: none)
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub label: String,
    pub item: Selector,
    pub title: Option<Selector>,
    pub link: Option<Selector>,
    pub date: Option<Selector>,
}

impl ExtractionRule {
    pub fn new(item: &str) -> Result<Self, SelectorError> {
        Ok(Self {
            label: item.to_string(),
            item: compile_selector(item)?,
            title: None,
            link: None,
            date: None,
        })
    }

    pub fn with_title(mut self, css: &str) -> Result<Self, SelectorError> {
        self.title = Some(compile_selector(css)?);
        Ok(self)
    }

    pub fn with_link(mut self, css: &str) -> Result<Self, SelectorError> {
        self.link = Some(compile_selector(css)?);
        Ok(self)
    }

    pub fn with_date(mut self, css: &str) -> Result<Self, SelectorError> {
        self.date = Some(compile_selector(css)?);
        Ok(self)
    }
}

/// A news source the orchestrator polls.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub name: String,
    /// Page that lists the latest headlines.
    pub url: Url,
    /// Base used to resolve relative links found on the page.
    pub base_url: Url,
    /// Tried in order; the first rule matching any element wins.
    pub rules: Vec<ExtractionRule>,
    pub timeout: Duration,
}

/// The raw output of applying one rule to one matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub text: String,
    pub href: Option<String>,
    pub date: Option<String>,
}

/// A validated headline ready for filtering, dedup and delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: Url,
    pub source: String,
    pub discovered_at: DateTime<Local>,
    /// Date text scraped from the listing, when the rule provides one.
    pub published: Option<String>,
    /// Dedup key derived from the title; see [`fingerprint`].
    pub fingerprint: String,
}

impl NewsItem {
    pub fn new(title: String, link: Url, source: &str, published: Option<String>) -> Self {
        let fingerprint = fingerprint(&title);
        Self {
            title,
            link,
            source: source.to_string(),
            discovered_at: Local::now(),
            published,
            fingerprint,
        }
    }

    /// The date shown to readers: the scraped one, else the discovery date.
    pub fn display_date(&self) -> String {
        match &self.published {
            Some(date) => date.clone(),
            None => self.discovered_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}
