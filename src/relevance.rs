//! Keyword relevance gate for headlines.

use tracing::trace;

/// Titles shorter than this are never relevant.
pub const MIN_TITLE_CHARS: usize = 15;

/// Built-in stock, finance and corporate-action vocabulary.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "aksi korporasi",
    "corporate action",
    "right issue",
    "rights issue",
    "ekspansi bisnis",
    "ekspansi",
    "backdoor listing",
    "dividen",
    "stock split",
    "obligasi",
    "sukuk",
    "reksadana",
    "emiten",
    "ipo",
    "saham",
    "bursa efek",
    "korporasi",
    "rups",
    "buyback",
    "tender offer",
];

/// Case-insensitive substring match against a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl RelevanceFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_relevant(&self, title: &str) -> bool {
        let title = title.trim();
        if title.chars().count() < MIN_TITLE_CHARS {
            return false;
        }
        let lower = title.to_lowercase();
        let hit = self.keywords.iter().find(|k| lower.contains(k.as_str()));
        trace!(title, keyword = ?hit, "Relevance check");
        hit.is_some()
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_boundary() {
        let filter = RelevanceFilter::default();
        let fourteen = "Dividen saham!";
        let fifteen = "Dividen saham!!";
        assert_eq!(fourteen.chars().count(), 14);
        assert_eq!(fifteen.chars().count(), 15);
        assert!(!filter.is_relevant(fourteen));
        assert!(filter.is_relevant(fifteen));
    }

    #[test]
    fn test_length_counts_chars_after_trim() {
        let filter = RelevanceFilter::default();
        assert!(!filter.is_relevant("   Dividen saham!   "));
    }

    #[test]
    fn test_case_insensitive_match() {
        let filter = RelevanceFilter::default();
        assert!(filter.is_relevant("IDX: EMITEN ABC BAGIKAN DIVIDEN INTERIM"));
        assert!(filter.is_relevant("Rencana Rights Issue Bank Daerah Disetujui"));
    }

    #[test]
    fn test_irrelevant_title_rejected() {
        let filter = RelevanceFilter::default();
        assert!(!filter.is_relevant("Cuaca cerah diperkirakan sepanjang pekan"));
    }

    #[test]
    fn test_custom_vocabulary() {
        let filter = RelevanceFilter::new(["  Nikel ", "", "BATUBARA"]);
        assert_eq!(filter.keywords(), &["nikel".to_string(), "batubara".to_string()]);
        assert!(filter.is_relevant("Harga nikel dunia kembali menguat"));
        assert!(!filter.is_relevant("Emiten ABC Bagikan Dividen Interim"));
    }
}
