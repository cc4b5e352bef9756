//! Headline extraction from a fetched listing page.
//!
//! A [`SourceDescriptor`] carries an ordered chain of [`ExtractionRule`]s.
//! Markup on news sites changes often, so the chain starts with the most
//! specific selector and falls back to broader ones. The first rule that
//! matches at least one element decides the page's candidates; later rules
//! are not evaluated even if the winner's candidates are mostly rejected.
//!
//! Each candidate then goes through shape validation:
//!
//! 1. Title text (whitespace collapsed) must be at least
//!    [`MIN_TITLE_CHARS`] characters.
//! 2. An `href` must be present and must not be a non-navigable target
//!    (`javascript:`, `mailto:`, fragment-only, `void(0)`).
//! 3. The `href` is resolved against the source's base URL and must be an
//!    absolute `http`/`https` URL with a host.

use crate::models::{ExtractionRule, NewsItem, RawCandidate, SourceDescriptor};
use crate::relevance::MIN_TITLE_CHARS;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Upper bound on matched elements examined per source.
pub const MAX_ELEMENTS_PER_SOURCE: usize = 20;

static FIRST_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));

static DENIED_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:javascript:|mailto:|#)|void\s*\(\s*0\s*\)").expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TitleTooShort,
    MissingHref,
    DeniedHref,
    InvalidUrl,
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl ExtractionRule {
    /// Apply this rule alone, returning one candidate per matched element.
    pub fn candidates(&self, document: &Html) -> Vec<RawCandidate> {
        document
            .select(&self.item)
            .take(MAX_ELEMENTS_PER_SOURCE)
            .map(|element| self.candidate(element))
            .collect()
    }

    fn candidate(&self, element: ElementRef<'_>) -> RawCandidate {
        // A configured title selector that misses leaves the text empty, so a
        // wrapper element never becomes one concatenated headline.
        let text = match &self.title {
            Some(sel) => element.select(sel).next().map(collapse_text).unwrap_or_default(),
            None => collapse_text(element),
        };

        let href = match &self.link {
            Some(sel) => element
                .select(sel)
                .next()
                .and_then(|el| el.value().attr("href")),
            None => element
                .value()
                .attr("href")
                .or_else(|| element.select(&FIRST_LINK).next().and_then(|a| a.value().attr("href"))),
        }
        .map(str::to_owned);

        let date = self
            .date
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .map(collapse_text)
            .filter(|d| !d.is_empty());

        RawCandidate { text, href, date }
    }
}

/// Resolve an `href` against `base`, accepting only absolute http(s) URLs.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let resolved = base.join(href.trim()).ok()?;
    let web = matches!(resolved.scheme(), "http" | "https");
    let has_host = resolved.host_str().is_some_and(|h| !h.is_empty());
    (web && has_host).then_some(resolved)
}

pub fn is_denied_href(href: &str) -> bool {
    DENIED_HREF.is_match(href)
}

fn normalize(candidate: RawCandidate, source: &SourceDescriptor) -> Result<NewsItem, Rejection> {
    let title = candidate.text.trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        return Err(Rejection::TitleTooShort);
    }
    let href = candidate.href.ok_or(Rejection::MissingHref)?;
    if is_denied_href(&href) {
        return Err(Rejection::DeniedHref);
    }
    let link = resolve_link(&source.base_url, &href).ok_or(Rejection::InvalidUrl)?;
    Ok(NewsItem::new(title.to_string(), link, &source.name, candidate.date))
}

/// Extract validated headlines from `html` using the source's rule chain.
#[instrument(level = "debug", skip_all, fields(source = %source.name))]
pub fn extract(html: &str, source: &SourceDescriptor) -> Vec<NewsItem> {
    let document = Html::parse_document(html);

    let winner = source
        .rules
        .iter()
        .map(|rule| (rule, rule.candidates(&document)))
        .find(|(_, candidates)| !candidates.is_empty());

    let Some((rule, candidates)) = winner else {
        warn!(source = %source.name, rules = source.rules.len(), "No extraction rule matched");
        return Vec::new();
    };

    let matched = candidates.len();
    let mut items = Vec::with_capacity(matched);
    for candidate in candidates {
        match normalize(candidate, source) {
            Ok(item) => items.push(item),
            Err(reason) => debug!(?reason, "Dropped candidate"),
        }
    }

    info!(
        source = %source.name,
        rule = %rule.label,
        matched,
        kept = items.len(),
        "Extracted headlines"
    );
    items
}
