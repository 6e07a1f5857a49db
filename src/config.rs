// Server configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root for per-request temp directories
    pub downloads_dir: PathBuf,
    /// Explicit yt-dlp binary, auto-discovered when unset
    pub ytdlp_path: Option<String>,
    pub proxy: Option<String>,
    /// cookies.txt passed to yt-dlp
    pub cookies_path: Option<String>,
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub log_level: Level,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("MEDIA_DL_PORT") {
            Some(v) => parse_value("MEDIA_DL_PORT", &v, "a port number")?,
            None => DEFAULT_PORT,
        };
        let metadata_timeout_secs = positive_secs(
            "MEDIA_DL_METADATA_TIMEOUT",
            get("MEDIA_DL_METADATA_TIMEOUT"),
            DEFAULT_METADATA_TIMEOUT_SECS,
        )?;
        let download_timeout_secs = positive_secs(
            "MEDIA_DL_DOWNLOAD_TIMEOUT",
            get("MEDIA_DL_DOWNLOAD_TIMEOUT"),
            DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        )?;
        let log_level = match get("MEDIA_DL_LOG_LEVEL") {
            Some(v) => parse_value("MEDIA_DL_LOG_LEVEL", &v, "one of trace, debug, info, warn, error")?,
            None => Level::INFO,
        };

        Ok(Self {
            host: get("MEDIA_DL_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            downloads_dir: get("MEDIA_DL_DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_downloads_dir),
            ytdlp_path: get("YTDLP_PATH"),
            proxy: get("YTDLP_PROXY"),
            cookies_path: get("YTDLP_COOKIES"),
            metadata_timeout_secs,
            download_timeout_secs,
            log_level,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: FromStr>(
    name: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        expected,
    })
}

fn positive_secs(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_value::<u64>(name, &value, "a positive number of seconds")? {
        0 => Err(ConfigError::InvalidValue {
            name,
            value,
            expected: "a positive number of seconds",
        }),
        secs => Ok(secs),
    }
}

fn default_downloads_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("media-downloader")
        .join("downloads")
}
