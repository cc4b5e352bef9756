//! Built-in source registry.
//!
//! Each source lists its extraction rules in the order they are tried. The
//! first rule is the tight, site-specific one; later rules are looser and
//! only used when a redesign breaks the earlier ones.
//!
//! | Source | Listing page |
//! |--------|--------------|
//! | IDX | <https://www.idx.co.id/id/berita/> |
//! | CNBC Indonesia | <https://www.cnbcindonesia.com/market> |
//! | Kontan | <https://investasi.kontan.co.id/> |
//! | Bisnis | <https://market.bisnis.com/> |
//!
//! The registry is replaced wholesale by `sources:` in the settings file.

use crate::models::{ExtractionRule, SourceDescriptor};
use std::time::Duration;
use url::Url;

/// `(item, title, link, date)` selectors for one rule.
type RuleDef = (&'static str, Option<&'static str>, Option<&'static str>, Option<&'static str>);

struct SourceDef {
    name: &'static str,
    url: &'static str,
    base_url: &'static str,
    rules: &'static [RuleDef],
}

const REGISTRY: &[SourceDef] = &[
    SourceDef {
        name: "IDX",
        url: "https://www.idx.co.id/id/berita/",
        base_url: "https://www.idx.co.id/",
        rules: &[
            ("div.news-item", Some("h3, h4, .news-title"), None, Some(".news-date, time")),
            ("div[class*=\"berita\"]", Some("h1, h2, h3, h4, h5, h6"), None, None),
            ("div[class*=\"news\"]", Some("h1, h2, h3, h4, h5, h6"), None, None),
            ("article", Some("h1, h2, h3, h4, h5, h6"), None, Some("time")),
            ("div.list-berita a[href], div.post a[href], div.item a[href]", None, None, None),
        ],
    },
    SourceDef {
        name: "CNBC Indonesia",
        url: "https://www.cnbcindonesia.com/market",
        base_url: "https://www.cnbcindonesia.com/",
        rules: &[
            ("article", Some("h2"), Some("a[href]"), Some(".date, time")),
            ("ul.list li", Some("h2, h3"), None, None),
        ],
    },
    SourceDef {
        name: "Kontan",
        url: "https://investasi.kontan.co.id/",
        base_url: "https://investasi.kontan.co.id/",
        rules: &[
            ("div.list-berita li", Some("h1 a, h2 a"), Some("h1 a, h2 a"), Some("span.font-gray")),
            ("article", Some("h1, h2, h3"), None, None),
        ],
    },
    SourceDef {
        name: "Bisnis",
        url: "https://market.bisnis.com/",
        base_url: "https://market.bisnis.com/",
        rules: &[
            ("div.art--row", Some("h4.artTitle, h2"), Some("a.artLink, a[href]"), Some("div.artDate")),
            ("article", Some("h2, h3, h4"), None, None),
        ],
    },
];

fn build_rule((item, title, link, date): &RuleDef) -> ExtractionRule {
    let mut rule = ExtractionRule::new(item).expect("built-in item selector");
    if let Some(css) = title {
        rule = rule.with_title(css).expect("built-in title selector");
    }
    if let Some(css) = link {
        rule = rule.with_link(css).expect("built-in link selector");
    }
    if let Some(css) = date {
        rule = rule.with_date(css).expect("built-in date selector");
    }
    rule
}

/// The built-in registry, every source using `timeout`.
pub fn builtin_sources(timeout: Duration) -> Vec<SourceDescriptor> {
    REGISTRY
        .iter()
        .map(|def| SourceDescriptor {
            name: def.name.to_string(),
            url: Url::parse(def.url).expect("built-in source url"),
            base_url: Url::parse(def.base_url).expect("built-in base url"),
            rules: def.rules.iter().map(build_rule).collect(),
            timeout,
        })
        .collect()
}

/// The built-in registry with the default request timeout.
#[cfg(test)]
pub fn sources() -> Vec<SourceDescriptor> {
    builtin_sources(Duration::from_secs(15))
}
