//! Configuration file parser for ~/.config/bananaview/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted but logged, since they
//! are usually typos.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::feed::{AdvisoryMode, ContentFilter, FeedFilters, FeedMode, ThumbQuality};
use crate::resolution::PollerConfig;

pub const DEFAULT_API_BASE: &str = "https://gamebanana.com/apiv11";
pub const DEFAULT_GAME_ID: u64 = 8552;
pub const DEFAULT_METADATA_URL: &str = "http://127.0.0.1:5000/mod/api/subcat";
pub const DEFAULT_TERMS_URL: &str = "http://dataset.genshin-dictionary.com/words.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Top-level application configuration.
///
/// Every field has a default, so any subset of keys can be given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Track shown at startup (overridden by `--mode`).
    pub default_mode: FeedMode,
    pub content_filter: ContentFilter,
    /// Member id for the subscriptions track. Accepts a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    /// Preview image size, 220 or 530.
    pub thumb_quality: ThumbQuality,
    pub advisory_mode: AdvisoryMode,
    pub api: ApiConfig,
    pub poller: PollerSection,
    pub translation: TranslationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_mode: FeedMode::Recommended,
            content_filter: ContentFilter::Mods,
            user_id: None,
            thumb_quality: ThumbQuality::Large,
            advisory_mode: AdvisoryMode::Show,
            api: ApiConfig::default(),
            poller: PollerSection::default(),
            translation: TranslationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub game_id: u64,
    /// Batch category lookup endpoint (`?ids=1,2,3`).
    pub metadata_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            game_id: DEFAULT_GAME_ID,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_factor: u32,
    /// 0 = retry forever.
    pub max_attempts: u32,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            base_interval_ms: 5_000,
            max_interval_ms: 30_000,
            backoff_factor: 2,
            max_attempts: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Source for `--update-terms`.
    pub terms_url: String,
    /// Extra term list applied after the default one. Defaults to
    /// `custom-words.json` in the data directory.
    pub custom_terms: Option<PathBuf>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            terms_url: DEFAULT_TERMS_URL.to_string(),
            custom_terms: None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Raw::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

const TOP_LEVEL_KEYS: &[&str] = &[
    "default_mode",
    "content_filter",
    "user_id",
    "thumb_quality",
    "advisory_mode",
    "api",
    "poller",
    "translation",
];
const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("api", &["base_url", "game_id", "metadata_url", "request_timeout_secs"]),
    (
        "poller",
        &["base_interval_ms", "max_interval_ms", "backoff_factor", "max_attempts"],
    ),
    ("translation", &["terms_url", "custom_terms"]),
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → `Ok(Config::default())`
    /// - Invalid TOML or wrong value type → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warnings
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            mode = %config.default_mode,
            filter = %config.content_filter,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Poller timing with nonsensical values clamped: the factor is at
    /// least 1 and the cap is never below the base interval.
    pub fn poller_config(&self) -> PollerConfig {
        let base = self.poller.base_interval_ms.max(100);
        PollerConfig {
            base_interval: Duration::from_millis(base),
            max_interval: Duration::from_millis(self.poller.max_interval_ms.max(base)),
            backoff_factor: self.poller.backoff_factor.max(1),
            max_attempts: self.poller.max_attempts,
        }
    }

    pub fn feed_filters(&self) -> FeedFilters {
        FeedFilters {
            content: self.content_filter,
            user_id: self.user_id.clone(),
            thumb_quality: self.thumb_quality,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs.max(1))
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        }
        let Some((_, known)) = SECTION_KEYS.iter().find(|(section, _)| section == key) else {
            continue;
        };
        if let Some(table) = value.as_table() {
            for sub in table.keys() {
                if !known.contains(&sub.as_str()) {
                    tracing::warn!(section = %key, key = %sub, "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("bananaview_config_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_mode, FeedMode::Recommended);
        assert_eq!(config.content_filter, ContentFilter::Mods);
        assert_eq!(config.thumb_quality, ThumbQuality::Large);
        assert_eq!(config.advisory_mode, AdvisoryMode::Show);
        assert_eq!(config.api.game_id, 8552);
        assert_eq!(config.poller.max_attempts, 20);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/bananaview_test_nonexistent_config.toml");
        assert_eq!(Config::load(path).unwrap(), Config::default());
    }

    #[test]
    fn test_blank_file_returns_default() {
        let (dir, path) = scratch_file("blank", "  \n\n ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
default_mode = "Latest"
content_filter = "posts"
user_id = 1234567
thumb_quality = 220
advisory_mode = "blur"

[api]
base_url = "https://mirror.example/apiv11"
game_id = 1
metadata_url = "https://meta.example/subcat"
request_timeout_secs = 10

[poller]
base_interval_ms = 1000
max_interval_ms = 8000
backoff_factor = 3
max_attempts = 0

[translation]
custom_terms = "/home/me/terms.json"
"#;
        let config = Config::from_toml_str(content).unwrap();
        assert_eq!(config.default_mode, FeedMode::Latest);
        assert_eq!(config.content_filter, ContentFilter::Posts);
        assert_eq!(config.user_id.as_deref(), Some("1234567"));
        assert_eq!(config.thumb_quality, ThumbQuality::Small);
        assert_eq!(config.advisory_mode, AdvisoryMode::Blur);
        assert_eq!(config.api.game_id, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.translation.terms_url, DEFAULT_TERMS_URL);
        assert_eq!(
            config.translation.custom_terms.as_deref(),
            Some(Path::new("/home/me/terms.json"))
        );

        let poller = config.poller_config();
        assert_eq!(poller.base_interval, Duration::from_secs(1));
        assert_eq!(poller.max_interval, Duration::from_secs(8));
        assert_eq!(poller.backoff_factor, 3);
        assert_eq!(poller.max_attempts, 0);
    }

    #[test]
    fn test_user_id_as_string_and_blank() {
        let config = Config::from_toml_str("user_id = \" 42 \"").unwrap();
        assert_eq!(config.user_id.as_deref(), Some("42"));
        let config = Config::from_toml_str("user_id = \"\"").unwrap();
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_poller_values_are_clamped() {
        let config = Config::from_toml_str(
            "[poller]\nbase_interval_ms = 5000\nmax_interval_ms = 10\nbackoff_factor = 0\n",
        )
        .unwrap();
        let poller = config.poller_config();
        assert_eq!(poller.backoff_factor, 1);
        assert_eq!(poller.max_interval, poller.base_interval);
    }

    #[test]
    fn test_invalid_values_return_error() {
        assert!(matches!(
            Config::from_toml_str("thumb_quality = 100"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("default_mode = \"trending\""),
            Err(ConfigError::Parse(_))
        ));
        let err = Config::from_toml_str("this is not [valid toml").unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml_str(
            "advisory_mode = \"hide\"\ntypo_key = 1\n[poller]\nbase_interval = 3\n",
        )
        .unwrap();
        assert_eq!(config.advisory_mode, AdvisoryMode::Hide);
        assert_eq!(config.poller, PollerSection::default());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = scratch_file("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
