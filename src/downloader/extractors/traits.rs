// InfoExtractor trait and extraction config

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::RawMetadata;

/// Configuration for info extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_path: None,
            timeout_seconds: 30,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Trait for metadata sources
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Check if this extractor can run at all
    async fn is_available(&self) -> bool;

    /// Fetch the raw metadata blob for `url`
    async fn extract(&self, url: &str, config: &ExtractorConfig)
        -> Result<RawMetadata, DownloadError>;
}
