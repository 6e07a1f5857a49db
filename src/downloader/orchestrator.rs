// Orchestrator: metadata -> catalog -> selection -> plan -> instruction -> engine

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::CatalogBuilder;
use super::codecs::CodecTable;
use super::errors::DownloadError;
use super::extractors::{ExtractorConfig, InfoExtractor};
use super::format_selector::FormatSelector;
use super::models::{DownloadInstruction, DownloadRequestSpec, MediaCatalog, ReadyDownload};
use super::postprocess::PostProcessingPlanner;
use super::request_builder::RequestBuilder;
use super::storage::{PendingDownloads, TempFileGuard};
use super::traits::DownloaderBackend;

pub struct Downloader {
    extractor: Arc<dyn InfoExtractor>,
    backend: Arc<dyn DownloaderBackend>,
    extractor_config: ExtractorConfig,
    codecs: Arc<CodecTable>,
    builder: RequestBuilder,
    pending: PendingDownloads,
}

impl Downloader {
    pub fn new(
        extractor: Arc<dyn InfoExtractor>,
        backend: Arc<dyn DownloaderBackend>,
        extractor_config: ExtractorConfig,
        downloads_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            extractor,
            backend,
            extractor_config,
            codecs: Arc::new(CodecTable::default()),
            builder: RequestBuilder::new(downloads_dir),
            pending: PendingDownloads::new(),
        }
    }

    pub fn with_codecs(mut self, codecs: Arc<CodecTable>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    pub fn downloads_dir(&self) -> &Path {
        self.builder.downloads_dir()
    }

    /// Whether the metadata source can run
    pub async fn is_available(&self) -> bool {
        self.extractor.is_available().await
    }

    /// Fetch metadata for `url` and build its catalog.
    ///
    /// Any upstream failure is logged and reported as `MetadataUnavailable`.
    pub async fn media_info(&self, url: &str) -> Result<MediaCatalog, DownloadError> {
        debug!(extractor = self.extractor.name(), %url, "Fetching metadata");

        let meta = self
            .extractor
            .extract(url, &self.extractor_config)
            .await
            .map_err(|e| {
                warn!(extractor = self.extractor.name(), %url, "Metadata fetch failed: {}", e);
                DownloadError::MetadataUnavailable
            })?;

        let catalog = CatalogBuilder::from_metadata(&meta).map_err(|e| {
            warn!(%url, "Source reported no streams");
            e
        })?;

        info!(
            %url,
            title = %catalog.title,
            video = catalog.video_qualities.len(),
            audio = catalog.audio_qualities.len(),
            "Catalog built"
        );
        Ok(catalog)
    }

    /// Selection, post-processing plan and instruction for one request.
    ///
    /// Pure: nothing touches the filesystem or the engine.
    pub fn prepare(
        &self,
        url: &str,
        catalog: &MediaCatalog,
        spec: &DownloadRequestSpec,
        request_id: Uuid,
    ) -> Result<(DownloadInstruction, String), DownloadError> {
        let selection = FormatSelector::new(&self.codecs).select(catalog, spec)?;
        let plan = PostProcessingPlanner::new(&self.codecs).plan(&selection, spec.target_bitrate_kbps);
        Ok(self.builder.build(url, catalog, &selection, plan, request_id))
    }

    /// Run a full download and return the filename and token it is registered under
    pub async fn download(
        &self,
        url: &str,
        spec: &DownloadRequestSpec,
    ) -> Result<ReadyDownload, DownloadError> {
        let catalog = self.media_info(url).await?;
        let request_id = Uuid::new_v4();
        let (instruction, filename) = self.prepare(url, &catalog, spec, request_id)?;

        let request_dir = self.downloads_dir().join(request_id.to_string());
        tokio::fs::create_dir_all(&request_dir).await.map_err(|e| {
            DownloadError::DownloadFailed(format!("cannot create download directory: {}", e))
        })?;

        info!(
            backend = self.backend.name(),
            %url,
            %filename,
            %request_id,
            "Executing download"
        );
        if let Err(e) = self.backend.execute(&instruction).await {
            warn!(backend = self.backend.name(), %url, "Download failed: {}", e);
            if let Err(cleanup) = tokio::fs::remove_dir_all(&request_dir).await {
                debug!(dir = %request_dir.display(), "Cleanup after failure: {}", cleanup);
            }
            return Err(e);
        }

        self.pending
            .register(&filename, request_id, instruction.output_path, request_dir);
        info!(%filename, %request_id, "Download ready");
        Ok(ReadyDownload {
            filename,
            token: request_id,
        })
    }

    /// Hand over a pending file; the oldest one when no token is given
    pub fn take_file(&self, filename: &str, token: Option<Uuid>) -> Option<TempFileGuard> {
        self.pending.take(filename, token)
    }
}
