// CLI InfoExtractor - uses native `yt-dlp` binary
//
// One `--dump-single-json` run per URL, no retries, no player-client
// rotation. Stdout is the metadata blob.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{ExtractorConfig, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::RawMetadata;
use crate::downloader::utils::{
    find_binary, is_runnable, proxy_args, run_output_with_timeout, stderr_summary,
};

/// CLI-based info extractor using yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: String,
}

impl CliInfoExtractor {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }

    /// Discover yt-dlp, honoring an explicitly configured path
    pub fn discover(configured: Option<&str>) -> Self {
        Self::new(find_binary("yt-dlp", configured))
    }

    pub fn ytdlp_path(&self) -> &str {
        &self.ytdlp_path
    }

    /// Build command arguments
    fn build_args(url: &str, config: &ExtractorConfig) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];

        args.extend(proxy_args(config.proxy.as_deref()));

        if let Some(path) = &config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        // URL is never parsed as an option
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn parse_json(stdout: &[u8]) -> Result<RawMetadata, DownloadError> {
        serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

impl Default for CliInfoExtractor {
    fn default() -> Self {
        Self::discover(None)
    }
}

#[async_trait]
impl InfoExtractor for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn is_available(&self) -> bool {
        is_runnable(&self.ytdlp_path).await
    }

    async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
    ) -> Result<RawMetadata, DownloadError> {
        let args = Self::build_args(url, config);
        debug!(
            extractor = self.name(),
            "Running {} {}",
            self.ytdlp_path,
            args.join(" ")
        );

        let out = run_output_with_timeout(&self.ytdlp_path, args, config.timeout_seconds).await?;
        if !out.status.success() {
            let detail = stderr_summary(&out.stderr);
            warn!(extractor = self.name(), %url, "Metadata fetch failed: {}", detail);
            return Err(DownloadError::ExecutionError(detail));
        }

        Self::parse_json(&out.stdout)
    }
}
