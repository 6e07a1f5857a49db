// Downloader backend trait definition

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::DownloadInstruction;

/// Trait for fetch/transcode engine implementations
#[async_trait]
pub trait DownloaderBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Run one instruction to completion.
    ///
    /// On success the file exists at `instruction.output_path`. Any failure
    /// is `DownloadFailed` with the engine's message as detail.
    async fn execute(&self, instruction: &DownloadInstruction) -> Result<(), DownloadError>;
}
