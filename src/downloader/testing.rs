// In-crate fakes for the metadata source and the engine backend

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::errors::DownloadError;
use super::extractors::{ExtractorConfig, InfoExtractor};
use super::models::{DownloadInstruction, RawMetadata};
use super::traits::DownloaderBackend;

/// A realistic yt-dlp blob: 1080p at 30/60 fps, AAC and Opus audio
pub fn sample_metadata() -> RawMetadata {
    serde_json::from_str(
        r#"{
            "title": "My Video! #1",
            "thumbnail": "https://i.ytimg.com/vi/abc/maxresdefault.jpg",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 128},
                {"format_id": "141", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 192},
                {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 160},
                {"format_id": "136", "ext": "mp4", "vcodec": "avc1.4d401f", "acodec": "none", "height": 720, "fps": 30},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 30},
                {"format_id": "303", "ext": "webm", "vcodec": "vp9", "acodec": "none", "height": 1080, "fps": 60}
            ]
        }"#,
    )
    .unwrap()
}

pub struct FakeExtractor {
    result: Result<RawMetadata, DownloadError>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn ok(meta: RawMetadata) -> Self {
        Self {
            result: Ok(meta),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: DownloadError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InfoExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn extract(&self, _url: &str, _config: &ExtractorConfig) -> Result<RawMetadata, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Writes a small payload to the output path, or fails with a fixed message
pub struct FakeBackend {
    failure: Option<String>,
    calls: AtomicUsize,
    last: Mutex<Option<DownloadInstruction>>,
}

impl FakeBackend {
    pub fn ok() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_instruction(&self) -> Option<DownloadInstruction> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl DownloaderBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn execute(&self, instruction: &DownloadInstruction) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(instruction.clone());

        if let Some(message) = &self.failure {
            return Err(DownloadError::DownloadFailed(message.clone()));
        }
        tokio::fs::write(&instruction.output_path, b"media bytes")
            .await
            .map_err(|e| DownloadError::DownloadFailed(e.to_string()))
    }
}
