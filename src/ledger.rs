//! Durable record of headlines already delivered.
//!
//! The ledger is an insertion-ordered set of title fingerprints persisted as a
//! line-delimited text file (one fingerprint per line). It is loaded once at
//! startup, appended to after each successful delivery, and rewritten as a
//! whole at checkpoints.
//!
//! # Retention
//!
//! The ledger is bounded. Once it holds more than
//! [`RetentionPolicy::max_entries`], [`Ledger::prune`] evicts the oldest
//! fingerprints until only [`RetentionPolicy::retain_entries`] remain. Evicted
//! headlines may be delivered again if a source still lists them.

use crate::models::NewsItem;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Stable dedup key for a headline.
///
/// The first 128 bits of SHA-256 over the trimmed, lower-cased title, as 32
/// hex characters. The link is not part of the key.
pub fn fingerprint(title: &str) -> String {
    let normalized = title.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// `Ok(None)` when the file does not exist yet.
fn read_fingerprints(path: &Path) -> io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Pruning starts once the ledger grows past this many entries.
    pub max_entries: usize,
    /// Number of most recent entries kept after pruning.
    pub retain_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 500,
            retain_entries: 300,
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    order: VecDeque<String>,
    members: HashSet<String>,
    retention: RetentionPolicy,
    dirty: bool,
}

impl Ledger {
    /// Load the ledger from `path`.
    ///
    /// A missing file yields an empty ledger. An unreadable file is logged and
    /// also yields an empty ledger rather than failing startup.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, retention: RetentionPolicy) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut ledger = Self {
            path,
            order: VecDeque::new(),
            members: HashSet::new(),
            retention,
            dirty: false,
        };

        match read_fingerprints(&ledger.path) {
            Ok(Some(entries)) => {
                for fp in entries {
                    ledger.insert(fp);
                }
                ledger.dirty = false;
                info!(count = ledger.len(), "Loaded delivered-headline ledger");
            }
            Ok(None) => {
                info!("No ledger file yet; starting empty");
            }
            Err(e) => {
                warn!(error = %e, "Ledger unreadable; starting empty");
            }
        }

        ledger.prune();
        ledger
    }

    /// Merge in fingerprints another process wrote since the last load.
    ///
    /// Call with the state lock held. Entries already in memory keep their
    /// position; new ones are appended. Returns the number merged.
    pub fn reload(&mut self) -> usize {
        let entries = match read_fingerprints(&self.path) {
            Ok(Some(entries)) => entries,
            Ok(None) => return 0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ledger unreadable; keeping in-memory copy");
                return 0;
            }
        };
        let was_dirty = self.dirty;
        let merged = entries.into_iter().filter(|fp| self.insert(fp.clone())).count();
        // Entries that came from the file need no rewrite.
        self.dirty = was_dirty;
        if merged > 0 {
            info!(merged, total = self.len(), "Merged ledger entries written by another run");
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.members.contains(fingerprint)
    }

    /// True when the item's headline has not been delivered yet.
    pub fn is_new(&self, item: &NewsItem) -> bool {
        !self.contains(&item.fingerprint)
    }

    /// Record a delivered item. Returns false if it was already present.
    pub fn mark_delivered(&mut self, item: &NewsItem) -> bool {
        let inserted = self.insert(item.fingerprint.clone());
        if inserted {
            debug!(fingerprint = %item.fingerprint, "Marked delivered");
        }
        inserted
    }

    fn insert(&mut self, fingerprint: String) -> bool {
        if !self.members.insert(fingerprint.clone()) {
            return false;
        }
        self.order.push_back(fingerprint);
        self.dirty = true;
        true
    }

    /// Apply the retention policy. Returns the number of evicted entries.
    pub fn prune(&mut self) -> usize {
        if self.order.len() <= self.retention.max_entries {
            return 0;
        }
        let keep = self.retention.retain_entries.min(self.retention.max_entries);
        let mut evicted = 0;
        while self.order.len() > keep {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                evicted += 1;
            }
        }
        self.dirty = true;
        info!(evicted, remaining = self.order.len(), "Pruned ledger");
        evicted
    }

    /// Rewrite the backing file if anything changed since the last flush.
    ///
    /// Writes to a sibling temporary file and renames it over the ledger. On
    /// failure the in-memory state stays dirty so the next checkpoint retries.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut contents = String::with_capacity(self.order.len() * 33);
        for fp in &self.order {
            contents.push_str(fp);
            contents.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        debug!(path = %self.path.display(), count = self.order.len(), "Flushed ledger");
        Ok(())
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(path = %self.path.display(), error = %e, "Failed to flush ledger on drop");
        }
    }
}
