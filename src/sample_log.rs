//! Bounded log of recently seen headlines, for operator inspection only.
//!
//! Every relevant item from a batch is recorded here whether or not it is
//! delivered. The log is written as a JSON array with RFC 3339 timestamps and
//! has no influence on delivery decisions.

use crate::models::NewsItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub title: String,
    pub link: String,
    pub source: String,
    pub seen_at: DateTime<Utc>,
}

impl From<&NewsItem> for SampleEntry {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.to_string(),
            source: item.source.clone(),
            seen_at: item.discovered_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug)]
pub struct SampleLog {
    path: Option<PathBuf>,
    capacity: usize,
    entries: VecDeque<SampleEntry>,
    dirty: bool,
}

impl SampleLog {
    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            capacity: 0,
            entries: VecDeque::new(),
            dirty: false,
        }
    }

    pub fn load(path: PathBuf, capacity: usize) -> Self {
        let mut entries: VecDeque<SampleEntry> = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<SampleEntry>>(&raw) {
                Ok(list) => list.into(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Sample log is not valid JSON; starting fresh");
                    VecDeque::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Sample log unreadable; starting fresh");
                VecDeque::new()
            }
        };
        while entries.len() > capacity {
            entries.pop_front();
        }
        Self {
            path: Some(path),
            capacity,
            entries,
            dirty: false,
        }
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = &SampleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn record(&mut self, item: &NewsItem) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SampleEntry::from(item));
        self.dirty = true;
    }

    pub fn flush(&mut self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        self.dirty = false;
        debug!(path = %path.display(), count = self.entries.len(), "Wrote sample log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn item(title: &str) -> NewsItem {
        NewsItem::new(
            title.to_string(),
            Url::parse("https://www.idx.co.id/berita/7").unwrap(),
            "IDX",
            None,
        )
    }

    #[test]
    fn test_record_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SampleLog::load(dir.path().join("recent.json"), 3);
        for i in 0..5 {
            log.record(&item(&format!("Headline {i} tentang saham")));
        }
        assert_eq!(log.len(), 3);
        let titles: Vec<&str> = log.entries().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Headline 2 tentang saham",
                "Headline 3 tentang saham",
                "Headline 4 tentang saham"
            ]
        );
    }

    #[test]
    fn test_flush_writes_json_array_with_iso_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent.json");
        let mut log = SampleLog::load(path.clone(), 10);
        log.record(&item("Emiten ABC Bagikan Dividen Interim"));
        log.flush().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        let seen_at = arr[0]["seen_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(seen_at).is_ok());

        let reloaded = SampleLog::load(path, 10);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_invalid_json_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent.json");
        std::fs::write(&path, "{not json").unwrap();
        let log = SampleLog::load(path, 10);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_disabled_log_records_nothing() {
        let mut log = SampleLog::disabled();
        log.record(&item("Emiten ABC Bagikan Dividen Interim"));
        assert_eq!(log.len(), 0);
        assert!(log.flush().is_ok());
    }
}
