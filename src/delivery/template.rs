//! Message rendering for the output channel.
//!
//! The full template carries title, date, source, link and every hashtag.
//! The short template is the degraded form used after a size or formatting
//! rejection: a truncated title, the link, and a single hashtag.

use super::ParseMode;
use crate::models::NewsItem;
use crate::utils::truncate_chars;
use html_escape::encode_text;

pub const SHORT_TITLE_CHARS: usize = 100;

pub const DEFAULT_HASHTAGS: &[&str] = &["#BeritaSaham", "#IDX", "#Investasi"];

#[derive(Debug, Clone)]
pub struct MessageTemplate {
    hashtags: Vec<String>,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_HASHTAGS)
    }
}

impl MessageTemplate {
    pub fn new<I, S>(hashtags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hashtags = hashtags
            .into_iter()
            .map(|t| t.as_ref().trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .map(|t| format!("#{t}"))
            .collect();
        Self { hashtags }
    }

    /// Full message in Telegram HTML mode.
    pub fn render_full(&self, item: &NewsItem) -> String {
        let mut text = format!(
            "📢 <b>{}</b>\n\n📅 {}\n📰 {}\n\n🔗 {}",
            encode_text(&item.title),
            encode_text(&item.display_date()),
            encode_text(&item.source),
            encode_text(item.link.as_str()),
        );
        if !self.hashtags.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.hashtags.join(" "));
        }
        text
    }

    /// Degraded message for a retry after a rejection.
    pub fn render_short(&self, item: &NewsItem, mode: ParseMode) -> String {
        let title = truncate_chars(&item.title, SHORT_TITLE_CHARS);
        let mut text = match mode {
            ParseMode::Html => format!(
                "📢 <b>{}</b>\n🔗 {}",
                encode_text(&title),
                encode_text(item.link.as_str())
            ),
            ParseMode::Plain => format!("📢 {}\n🔗 {}", title, item.link),
        };
        if let Some(tag) = self.hashtags.first() {
            text.push('\n');
            text.push_str(tag);
        }
        text
    }
}
