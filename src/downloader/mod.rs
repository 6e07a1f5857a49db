// Downloader module - format selection and download request building

pub mod backends;
pub mod catalog;
pub mod codecs;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod postprocess;
pub mod request_builder;
pub mod storage;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::CatalogBuilder;
pub use codecs::{CodecCapability, CodecTable, ContainerAudio};
pub use errors::DownloadError;
pub use format_selector::FormatSelector;
pub use models::{
    AudioQuality, DownloadInstruction, DownloadRequestSpec, MediaCatalog, ReadyDownload,
    SelectionResult, VideoQuality,
};
pub use orchestrator::Downloader;
pub use postprocess::PostProcessingPlanner;
pub use request_builder::{sanitize_title, RequestBuilder};
pub use storage::{PendingDownloads, TempFileGuard};
pub use traits::DownloaderBackend;
