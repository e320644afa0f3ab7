//! Configuration types for kfdl

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default feed the episodes are read from
pub const DEFAULT_FEED_URL: &str = "https://www.spreaker.com/show/5602119/episodes/feed";

/// Default ledger file name, relative to the working directory
pub const DEFAULT_LEDGER_FILE: &str = "kfdl-state.txt";

/// Download behavior configuration (directories, concurrency, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory the media files are written to (default: ".")
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Maximum number of items downloading at the same time (default: 2)
    #[serde(default = "default_max_parallel")]
    pub max_parallel_downloads: usize,

    /// Upper bound for a single transfer, in seconds (default: 1800)
    ///
    /// A hung connection fails the item after this long instead of blocking its
    /// worker forever.
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub transfer_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            max_parallel_downloads: default_max_parallel(),
            transfer_timeout: default_transfer_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Ledger persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger file (default: `<working_dir>/kfdl-state.txt`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Minimum time between debounced saves, in milliseconds (default: 1000)
    #[serde(default = "default_save_interval", with = "duration_ms_serde")]
    pub save_interval: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            save_interval: default_save_interval(),
        }
    }
}

/// Candidate generation and probing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Base of the official path template `<base>/<yyyy>/<MM>/<d>/<yyyyMMdd>_<stem>.mp3`
    #[serde(default = "default_official_base_url")]
    pub official_base_url: String,

    /// First date for which the official source exists; earlier items go
    /// straight to the fallback URL (default: 2023-07-20)
    #[serde(default = "default_official_since")]
    pub official_since: NaiveDate,

    /// File name stems tried in order after the date prefix
    #[serde(default = "default_filename_stems")]
    pub filename_stems: Vec<String>,

    /// Exact file names (or absolute URLs) for dates that do not follow any stem
    #[serde(default)]
    pub overrides: BTreeMap<NaiveDate, String>,

    /// Dates only ever published by the secondary provider
    #[serde(default)]
    pub secondary_only_dates: BTreeSet<NaiveDate>,

    /// Hosts whose fallback URLs must not be used
    #[serde(default)]
    pub blocked_fallback_hosts: Vec<String>,

    /// Timeout of a single existence probe, in seconds (default: 10)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            official_base_url: default_official_base_url(),
            official_since: default_official_since(),
            filename_stems: default_filename_stems(),
            overrides: BTreeMap::new(),
            secondary_only_dates: BTreeSet::new(),
            blocked_fallback_hosts: Vec::new(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// Feed source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// RSS or Atom feed URL
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Regular expressions; items whose title matches any of them are ignored
    #[serde(default = "default_exclude_title_patterns")]
    pub exclude_title_patterns: Vec<String>,

    /// Timeout of the feed request, in seconds (default: 30)
    #[serde(default = "default_feed_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            exclude_title_patterns: default_exclude_title_patterns(),
            timeout: default_feed_timeout(),
        }
    }
}

/// Tag values written into finished files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Write tags at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Album name
    #[serde(default = "default_album")]
    pub album: String,

    /// Album artist
    #[serde(default = "default_album_artist")]
    pub album_artist: String,

    /// ISO 639-2 language code
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            album: default_album(),
            album_artist: default_album_artist(),
            language: default_language(),
        }
    }
}

/// Main configuration
///
/// Every section and field has a default, so an empty file is a valid
/// configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directories, concurrency and timeouts
    #[serde(default)]
    pub download: DownloadConfig,

    /// Ledger persistence
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// URL resolution
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Feed source
    #[serde(default)]
    pub feed: FeedConfig,

    /// Tag writing
    #[serde(default)]
    pub tagging: TaggingConfig,
}

impl Config {
    /// Default configuration writing into `working_dir`
    pub fn for_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.download.working_dir = working_dir.into();
        config
    }

    /// Load a configuration file; `.json` files are read as JSON, anything else as TOML
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            serde_json::from_str(&content).map_err(|e| Error::Config {
                message: format!("invalid JSON in '{}': {}", path.display(), e),
                key: None,
            })?
        } else {
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("invalid TOML in '{}': {}", path.display(), e),
                key: None,
            })?
        };

        Ok(config)
    }

    /// Ledger file path, defaulting to `<working_dir>/kfdl-state.txt`
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger
            .path
            .clone()
            .unwrap_or_else(|| self.download.working_dir.join(DEFAULT_LEDGER_FILE))
    }

    /// Check settings that have no sensible interpretation
    pub fn validate(&self) -> Result<()> {
        if self.download.max_parallel_downloads == 0 {
            return Err(Error::config("max_parallel_downloads", "must be at least 1"));
        }
        if self.download.working_dir.as_os_str().is_empty() {
            return Err(Error::config("working_dir", "must not be empty"));
        }
        if self.download.transfer_timeout.is_zero() {
            return Err(Error::config("transfer_timeout", "must be greater than 0"));
        }
        if self.resolver.probe_timeout.is_zero() {
            return Err(Error::config("probe_timeout", "must be greater than 0"));
        }
        for pattern in &self.feed.exclude_title_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                Error::config("exclude_title_patterns", format!("{pattern:?}: {e}"))
            })?;
        }
        Ok(())
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_parallel() -> usize {
    2
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_user_agent() -> String {
    format!("kfdl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_save_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_official_base_url() -> String {
    "https://kontrafunk.radio/images/audio/sendungen".to_string()
}

fn default_official_since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, 20).unwrap_or(NaiveDate::MIN)
}

fn default_filename_stems() -> Vec<String> {
    [
        "Kontrafunk_aktuell",
        "Kontrafunk_aktuell_",
        "Kontrafunk_Aktuell",
        "KONTRAFUNK_aktuell",
        "kontrafunk_aktuell",
        "Kontrafunk aktuell",
        "Kontrafunk-aktuell",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_exclude_title_patterns() -> Vec<String> {
    vec!["Wochenrückblick".to_string()]
}

fn default_feed_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_album() -> String {
    "Kontrafunk aktuell".to_string()
}

fn default_album_artist() -> String {
    "Kontrafunk".to_string()
}

fn default_language() -> String {
    "deu".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
