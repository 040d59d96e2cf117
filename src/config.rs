//! Configuration types for tgmedia-dl
//!
//! Configuration is loaded once at startup from a YAML file, validated, and
//! then passed by reference into the orchestrator and dispatcher constructors.
//! There is no ambient global state and no runtime reload.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Chat transport credentials and connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (required)
    #[serde(default)]
    pub token: String,

    /// Override the API base URL (used by tests; default is the public API)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Long-poll timeout in seconds for update polling
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// SOCKS5 proxy settings, applied to both the transport client and the
/// extraction engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether the proxy is used at all
    #[serde(default)]
    pub enabled: bool,

    /// Proxy host
    #[serde(default = "default_proxy_host")]
    pub host: String,

    /// Proxy port
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_proxy_host(),
            port: default_proxy_port(),
        }
    }
}

impl ProxyConfig {
    /// The socks5://host:port URL, or None when the proxy is disabled
    pub fn socks5_url(&self) -> Option<String> {
        if self.enabled {
            Some(format!("socks5://{}:{}", self.host, self.port))
        } else {
            None
        }
    }
}

/// Extraction-engine settings (format selector, cookies, filename flags)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Format selector passed to the engine (default: "best")
    #[serde(default = "default_format")]
    pub format: String,

    /// Raw cookie string ("name=value; name2=value2"), materialized to a
    /// scoped Netscape-format file for the duration of each fetch
    #[serde(default)]
    pub cookies: String,

    /// Restrict filenames to ASCII-safe characters
    #[serde(default = "default_true")]
    pub restrict_filenames: bool,

    /// Avoid characters that are invalid on Windows filesystems
    #[serde(default)]
    pub windows_safe_filenames: bool,

    /// Continue enumerating playlists past inaccessible entries
    #[serde(default = "default_true")]
    pub ignore_errors: bool,

    /// Path to the yt-dlp executable (auto-detected from PATH if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            cookies: String::new(),
            restrict_filenames: true,
            windows_safe_filenames: false,
            ignore_errors: true,
            ytdlp_path: None,
        }
    }
}

/// Directory layout: working/staging areas and destination roots
///
/// All paths are relative to `base_dir`. The working area is partitioned per
/// content origin; the destination area is partitioned by content category
/// for attachment-origin files and flat for link-origin video.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base directory all other paths are resolved against (default: ".")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

impl DirectoryConfig {
    /// Working area for attachment downloads
    pub fn attachment_working_dir(&self) -> PathBuf {
        self.base_dir.join("temp").join("telegram")
    }

    /// Working area for link downloads
    pub fn link_working_dir(&self) -> PathBuf {
        self.base_dir.join("temp").join("youtube")
    }

    /// Destination root for attachment-origin videos
    pub fn video_dir(&self) -> PathBuf {
        self.base_dir.join("downloads").join("telegram").join("videos")
    }

    /// Destination root for attachment-origin audio
    pub fn audio_dir(&self) -> PathBuf {
        self.base_dir.join("downloads").join("telegram").join("audios")
    }

    /// Destination root for attachment-origin photos
    pub fn photo_dir(&self) -> PathBuf {
        self.base_dir.join("downloads").join("telegram").join("photos")
    }

    /// Destination root for attachment-origin documents
    pub fn document_dir(&self) -> PathBuf {
        self.base_dir
            .join("downloads")
            .join("telegram")
            .join("documents")
    }

    /// Destination root for everything else attachment-origin
    pub fn other_dir(&self) -> PathBuf {
        self.base_dir.join("downloads").join("telegram").join("others")
    }

    /// Flat destination root for link-origin video
    pub fn link_dest_dir(&self) -> PathBuf {
        self.base_dir.join("downloads").join("youtube")
    }

    /// Every directory that must exist before jobs run
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.attachment_working_dir(),
            self.link_working_dir(),
            self.video_dir(),
            self.audio_dir(),
            self.photo_dir(),
            self.document_dir(),
            self.other_dir(),
            self.link_dest_dir(),
        ]
    }
}

/// Status reporter tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Maximum number of individual failure lines in a terminal summary;
    /// further failures are folded into an overflow count
    #[serde(default = "default_max_failure_lines")]
    pub max_failure_lines: usize,

    /// Minimum seconds between consecutive status-message edits.
    /// Terminal edits are always sent.
    #[serde(default = "default_min_edit_interval")]
    pub min_edit_interval_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_failure_lines: default_max_failure_lines(),
            min_edit_interval_secs: default_min_edit_interval(),
        }
    }
}

/// One scheduled-message entry as written in the config file
///
/// Entries are validated at dispatcher construction; invalid time strings or
/// missing fields skip that single entry with a logged warning, never a
/// fatal error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawScheduleEntry {
    /// Target chat identifier
    #[serde(default)]
    pub target: Option<i64>,

    /// Message text to send
    #[serde(default)]
    pub message: Option<String>,

    /// Time of day, "HH:MM" 24-hour format
    #[serde(default)]
    pub time: Option<String>,
}

/// Main configuration for the orchestrator process
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat transport settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// SOCKS5 proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Extraction-engine settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Directory layout
    #[serde(default)]
    pub directories: DirectoryConfig,

    /// Status reporter tuning
    #[serde(default)]
    pub reporter: ReporterConfig,

    /// Scheduled-message entries
    #[serde(default)]
    pub schedule: Vec<RawScheduleEntry>,

    /// Log level filter (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// Missing optional fields fall back to their defaults; a missing or
    /// unreadable file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file '{}': {e}", path.display()),
            key: None,
        })?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("cannot parse config file '{}': {e}", path.display()),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required settings
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(Error::Config {
                message: "telegram bot token is not set".into(),
                key: Some("telegram.token".into()),
            });
        }
        if self.fetch.format.trim().is_empty() {
            return Err(Error::Config {
                message: "fetch format selector must not be empty".into(),
                key: Some("fetch.format".into()),
            });
        }
        Ok(())
    }

    /// Create the working and destination directory tree
    pub async fn bootstrap_dirs(&self) -> Result<()> {
        for dir in self.directories.all_dirs() {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to create directory '{}': {e}", dir.display()),
                ))
            })?;
        }
        Ok(())
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    7890
}

fn default_format() -> String {
    "best".to_string()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_failure_lines() -> usize {
    10
}

fn default_min_edit_interval() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_parses_with_defaults() {
        let yaml = "telegram:\n  token: \"123:abc\"\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.fetch.format, "best");
        assert!(config.fetch.restrict_filenames);
        assert!(!config.proxy.enabled);
        assert_eq!(config.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn empty_token_fails_validation_with_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("telegram.token"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_format_fails_validation() {
        let config = Config {
            telegram: TelegramConfig {
                token: "t".into(),
                ..Default::default()
            },
            fetch: FetchConfig {
                format: "  ".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn proxy_url_only_when_enabled() {
        let mut proxy = ProxyConfig::default();
        assert_eq!(proxy.socks5_url(), None);

        proxy.enabled = true;
        assert_eq!(
            proxy.socks5_url().as_deref(),
            Some("socks5://127.0.0.1:7890")
        );
    }

    #[test]
    fn directory_layout_is_partitioned_by_category() {
        let dirs = DirectoryConfig {
            base_dir: PathBuf::from("/srv/media"),
        };
        assert_eq!(
            dirs.video_dir(),
            PathBuf::from("/srv/media/downloads/telegram/videos")
        );
        assert_eq!(
            dirs.link_dest_dir(),
            PathBuf::from("/srv/media/downloads/youtube")
        );
        assert_eq!(
            dirs.link_working_dir(),
            PathBuf::from("/srv/media/temp/youtube")
        );
        // Working areas are separate per content origin
        assert_ne!(dirs.attachment_working_dir(), dirs.link_working_dir());
    }

    #[test]
    fn schedule_entries_parse_leniently() {
        // A half-written entry must parse; validation happens at dispatcher
        // construction where it is skipped with a warning
        let yaml = r#"
telegram:
  token: "t"
schedule:
  - target: 42
    message: "good morning"
    time: "08:30"
  - message: "missing target"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.schedule.len(), 2);
        assert_eq!(config.schedule[0].target, Some(42));
        assert_eq!(config.schedule[1].target, None);
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
