//! Runtime settings.
//!
//! Settings come from an optional YAML file, then CLI flags and environment
//! variables override individual values. Every field has a default, so an
//! empty file (or no file) is valid apart from the Telegram credentials.
//!
//! ```yaml
//! poll_interval_secs: 300
//! state_dir: ./state
//! keywords: ["dividen", "rights issue", "saham"]
//! telegram:
//!   chat_id: "@idx_news"
//! browser:
//!   url: http://localhost:3000
//! sources:
//!   - name: IDX
//!     url: https://www.idx.co.id/id/berita/
//!     rules:
//!       - item: article
//!         title: h2, h3
//! ```

use crate::cli::Cli;
use crate::delivery::template::DEFAULT_HASHTAGS;
use crate::error::ConfigError;
use crate::fetch::http::DEFAULT_USER_AGENT;
use crate::ledger::RetentionPolicy;
use crate::models::{ExtractionRule, SourceDescriptor};
use crate::relevance::DEFAULT_KEYWORDS;
use crate::sources::builtin_sources;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub poll_interval_secs: u64,
    pub startup_delay_secs: u64,
    pub source_delay_ms: u64,
    pub delivery_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub user_agent: String,
    pub state_dir: PathBuf,
    pub ledger_file: String,
    /// Set to null to disable the sample log.
    pub sample_log_file: Option<String>,
    pub sample_log_size: usize,
    pub ledger_max_entries: usize,
    pub ledger_retain_entries: usize,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub link_preview: bool,
    pub telegram: TelegramSettings,
    pub browser: Option<BrowserSettings>,
    /// Replaces the built-in source registry when non-empty.
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: crate::delivery::telegram::TELEGRAM_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserSettings {
    pub url: String,
    pub token: Option<String>,
    #[serde(default = "default_browser_timeout")]
    pub timeout_secs: u64,
}

fn default_browser_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    /// Defaults to `url`.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub rules: Vec<RuleSettings>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleSettings {
    pub item: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
}

impl RuleSettings {
    pub fn compile(&self) -> Result<ExtractionRule, ConfigError> {
        let mut rule = ExtractionRule::new(&self.item)?;
        if let Some(css) = &self.title {
            rule = rule.with_title(css)?;
        }
        if let Some(css) = &self.link {
            rule = rule.with_link(css)?;
        }
        if let Some(css) = &self.date {
            rule = rule.with_date(css)?;
        }
        Ok(rule)
    }
}

impl SourceSettings {
    pub fn to_descriptor(&self, default_timeout: Duration) -> Result<SourceDescriptor, ConfigError> {
        let invalid = |reason: String| ConfigError::Source {
            source_name: self.name.clone(),
            reason,
        };
        if self.rules.is_empty() {
            return Err(invalid("at least one extraction rule is required".into()));
        }
        let url = Url::parse(&self.url).map_err(|e| invalid(format!("url: {e}")))?;
        let base_url = match &self.base_url {
            Some(base) => Url::parse(base).map_err(|e| invalid(format!("base_url: {e}")))?,
            None => url.clone(),
        };
        let rules = self
            .rules
            .iter()
            .map(RuleSettings::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceDescriptor {
            name: self.name.clone(),
            url,
            base_url,
            rules,
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(default_timeout),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            startup_delay_secs: 10,
            source_delay_ms: 1500,
            delivery_delay_ms: 1500,
            request_timeout_secs: 15,
            send_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            state_dir: PathBuf::from("state"),
            ledger_file: "sent_fingerprints.txt".to_string(),
            sample_log_file: Some("recent_items.json".to_string()),
            sample_log_size: 50,
            ledger_max_entries: 500,
            ledger_retain_entries: 300,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            hashtags: DEFAULT_HASHTAGS.iter().map(|t| t.to_string()).collect(),
            link_preview: true,
            telegram: TelegramSettings::default(),
            browser: None,
            sources: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let settings = Self::from_yaml_str(&raw)?;
        info!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Defaults, overlaid with the settings file (if any) and the CLI.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(token) = &cli.bot_token {
            self.telegram.bot_token = Some(token.clone());
        }
        if let Some(chat_id) = &cli.chat_id {
            self.telegram.chat_id = Some(chat_id.clone());
        }
        if let Some(secs) = cli.interval {
            self.poll_interval_secs = secs;
        }
        if let Some(dir) = &cli.state_dir {
            self.state_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.telegram.bot_token) {
            return Err(ConfigError::Missing("telegram.bot_token"));
        }
        if !present(&self.telegram.chat_id) {
            return Err(ConfigError::Missing("telegram.chat_id"));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.ledger_retain_entries > self.ledger_max_entries {
            return Err(ConfigError::Invalid {
                field: "ledger_retain_entries",
                reason: format!(
                    "{} exceeds ledger_max_entries ({})",
                    self.ledger_retain_entries, self.ledger_max_entries
                ),
            });
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "keywords",
                reason: "at least one keyword is required".into(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn delivery_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_entries: self.ledger_max_entries,
            retain_entries: self.ledger_retain_entries,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join(&self.ledger_file)
    }

    pub fn sample_log_path(&self) -> Option<PathBuf> {
        self.sample_log_file.as_ref().map(|f| self.state_dir.join(f))
    }

    /// Configured sources, or the built-in registry when none are configured.
    pub fn source_descriptors(&self) -> Result<Vec<SourceDescriptor>, ConfigError> {
        if self.sources.is_empty() {
            return Ok(builtin_sources(self.request_timeout()));
        }
        self.sources
            .iter()
            .map(|s| s.to_descriptor(self.request_timeout()))
            .collect()
    }
}
