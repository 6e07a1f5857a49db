// Error types for the download pipeline

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DownloadError {
    /// Metadata fetch failed or the source reported no streams.
    /// The upstream cause is logged, never returned to the caller.
    #[error("Invalid URL or unable to retrieve media information")]
    MetadataUnavailable,

    /// Contradictory or incomplete request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No audio stream satisfies the request")]
    NoAudioAvailable,

    #[error("No video stream satisfies the request")]
    NoVideoAvailable,

    /// External engine run failed; detail is the engine's own message
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// yt-dlp (or another tool) could not be started
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool ran but exited unsuccessfully or timed out
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Failed to parse tool output
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl DownloadError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Errors caused by the request or the source rather than by the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable
                | Self::InvalidRequest(_)
                | Self::NoAudioAvailable
                | Self::NoVideoAvailable
        )
    }

    /// Opaque detail text for failures that carry one.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::DownloadFailed(detail) => Some(detail),
            _ => None,
        }
    }
}
