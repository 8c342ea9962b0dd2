//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the download policy constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of user IDs allowed to use the bot.
    /// Empty or missing means everyone.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Extraction tool command
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Directory where downloads and conversions are written
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Hard deadline for a single extraction run
    #[serde(default = "default_ytdlp_timeout_secs")]
    pub ytdlp_timeout_secs: u64,

    /// Request timeout for the scraping fallback
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Files above this size are sent as documents
    #[serde(default = "default_max_inline_media_bytes")]
    pub max_inline_media_bytes: u64,

    /// Lifetime of an unanswered audio/video prompt, `0` disables expiry
    #[serde(default = "default_pending_choice_ttl_secs")]
    pub pending_choice_ttl_secs: u64,

    /// Python interpreter with `pdf2docx` installed
    #[serde(default = "default_converter_python")]
    pub converter_python: String,
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WORK_DIR)
}

const fn default_ytdlp_timeout_secs() -> u64 {
    YTDLP_TIMEOUT_SECS
}

const fn default_http_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

const fn default_max_inline_media_bytes() -> u64 {
    MAX_INLINE_MEDIA_BYTES
}

const fn default_pending_choice_ttl_secs() -> u64 {
    PENDING_CHOICE_TTL_SECS
}

fn default_converter_python() -> String {
    "python3".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            allowed_users_str: None,
            ytdlp_path: default_ytdlp_path(),
            work_dir: default_work_dir(),
            ytdlp_timeout_secs: YTDLP_TIMEOUT_SECS,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            max_inline_media_bytes: MAX_INLINE_MEDIA_BYTES,
            pending_choice_ttl_secs: PENDING_CHOICE_TTL_SECS,
            converter_python: default_converter_python(),
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP_WORK_DIR=/tmp/atlas ./target/app`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables, empty ones treated as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the set of Telegram IDs allowed to use the bot
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may use the bot. An empty allow-list admits everyone.
    #[must_use]
    pub fn is_allowed(&self, user_id: i64) -> bool {
        let allowed = self.allowed_users();
        allowed.is_empty() || allowed.contains(&user_id)
    }

    /// Extraction deadline as a `Duration`
    #[must_use]
    pub const fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs)
    }

    /// Scrape request timeout as a `Duration`
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Pending prompt lifetime, `None` when expiry is disabled
    #[must_use]
    pub const fn pending_choice_ttl(&self) -> Option<Duration> {
        if self.pending_choice_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.pending_choice_ttl_secs))
        }
    }
}

/// Default working directory for downloads
pub const DEFAULT_WORK_DIR: &str = "temp_downloads";
/// Extraction deadline in seconds
pub const YTDLP_TIMEOUT_SECS: u64 = 600; // 10 minutes
/// Scrape request timeout in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 30;
/// Inline media limit (60 MiB); larger files go out as documents
pub const MAX_INLINE_MEDIA_BYTES: u64 = 60 * 1024 * 1024;
/// Unanswered prompts are forgotten after this many seconds
pub const PENDING_CHOICE_TTL_SECS: u64 = 1800; // 30 minutes
/// Upper bound on tracked pending prompts
pub const PENDING_CHOICE_MAX_ENTRIES: u64 = 10_000;
/// Largest inbound document the bot will fetch (20 MB Bot API limit)
pub const MAX_INBOUND_DOCUMENT_BYTES: u32 = 20 * 1024 * 1024;

// Telegram API retry policy
/// Initial backoff between Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff between Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Attempts before a Telegram API operation is given up
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_parsing() {
        let mut settings = Settings {
            telegram_token: "dummy".to_string(),
            ..Settings::default()
        };

        // Test comma
        settings.allowed_users_str = Some("123,456".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&123));
        assert!(allowed.contains(&456));
        assert_eq!(allowed.len(), 2);

        // Test semicolon and mixed
        settings.allowed_users_str = Some("333; 444, 555".to_string());
        let allowed = settings.allowed_users();
        assert_eq!(allowed.len(), 3);

        // Test empty/bad parsing
        settings.allowed_users_str = Some("abc, 777".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&777));
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let mut settings = Settings::default();
        assert!(settings.is_allowed(42));

        settings.allowed_users_str = Some("7".to_string());
        assert!(settings.is_allowed(7));
        assert!(!settings.is_allowed(42));
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.pending_choice_ttl(),
            Some(Duration::from_secs(PENDING_CHOICE_TTL_SECS))
        );

        settings.pending_choice_ttl_secs = 0;
        assert_eq!(settings.pending_choice_ttl(), None);
    }

    #[test]
    fn test_defaults_match_policy_constants() {
        let settings = Settings::default();
        assert_eq!(settings.ytdlp_path, "yt-dlp");
        assert_eq!(settings.max_inline_media_bytes, 60 * 1024 * 1024);
        assert_eq!(settings.work_dir, PathBuf::from("temp_downloads"));
    }
}
