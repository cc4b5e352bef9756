//! Small helpers for string handling and file system checks.

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate to at most `max` characters, appending `…` when cut.
///
/// Counts characters rather than bytes, so multi-byte titles are never split
/// inside a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("short", 100), "short");
/// assert_eq!(truncate_chars("Saham naik tajam", 5), "Saham…");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("State directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_string() {
        assert_eq!(truncate_chars("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_chars_long_string() {
        let s = "a".repeat(500);
        let result = truncate_chars(&s, 100);
        assert_eq!(result.chars().count(), 101);
        assert!(result.ends_with('…'));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let s = "📈".repeat(10);
        assert_eq!(truncate_chars(&s, 3), "📈📈📈…");
    }

    #[test]
    fn test_truncate_chars_trims_trailing_space() {
        assert_eq!(truncate_chars("Saham naik tajam", 6), "Saham…");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("inner");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__write_check__").exists());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_writable_dir(&file).await.is_err());
    }
}
