// Common data models for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frame rate assumed when the source omits one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Output container for every video-carrying request without an explicit target
pub const DEFAULT_VIDEO_CONTAINER: &str = "mp4";

/// Metadata blob as returned by the metadata source (yt-dlp JSON shape)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// `None` when the source provides no stream list at all
    #[serde(default)]
    pub formats: Option<Vec<RawFormat>>,
}

/// One format entry in the metadata blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    /// File extension (mp4, webm, m4a)
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Video codec (avc1, vp9, av01, none)
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio codec (mp4a.40.2, opus, none)
    #[serde(default)]
    pub acodec: Option<String>,
    /// Average audio bitrate in kbps
    #[serde(default)]
    pub abr: Option<f64>,
}

/// Normalized per-stream descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct RawStreamDescriptor {
    pub has_video: bool,
    pub has_audio: bool,
    pub height_px: Option<u32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub average_bitrate_kbps: Option<f64>,
    pub container: Option<String>,
}

impl From<&RawFormat> for RawStreamDescriptor {
    fn from(f: &RawFormat) -> Self {
        // A missing vcodec is treated as "unknown video", only an explicit "none" rules it out
        let has_video = f.vcodec.as_deref() != Some("none");
        let has_audio = f.acodec.as_deref().map_or(false, |a| a != "none");

        Self {
            has_video,
            has_audio,
            height_px: f.height,
            frame_rate: f.fps,
            video_codec: f.vcodec.clone(),
            audio_codec: f.acodec.clone(),
            average_bitrate_kbps: f.abr,
            container: f.ext.clone(),
        }
    }
}

/// Video quality aggregated by height
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoQuality {
    /// Display label, e.g. "1080p"
    #[serde(rename = "resolution")]
    pub resolution_label: String,
    #[serde(rename = "height")]
    pub height_px: u32,
    /// Discovery order, no duplicates
    #[serde(rename = "fps")]
    pub available_frame_rates: Vec<f64>,
    /// File extensions seen at this height, discovery order
    #[serde(rename = "containers")]
    pub available_containers: Vec<String>,
}

/// Audio quality aggregated by codec
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioQuality {
    pub codec: String,
    #[serde(rename = "bitrates")]
    pub available_bitrates_kbps: Vec<f64>,
}

impl AudioQuality {
    pub fn max_bitrate(&self) -> Option<f64> {
        self.available_bitrates_kbps
            .iter()
            .copied()
            .fold(None, |best, b| match best {
                Some(cur) if cur >= b => Some(cur),
                _ => Some(b),
            })
    }

    /// Bitrate with minimum absolute distance to `target`; first seen wins ties
    pub fn closest_bitrate(&self, target: f64) -> Option<f64> {
        let mut best: Option<f64> = None;
        for &b in &self.available_bitrates_kbps {
            match best {
                Some(cur) if (cur - target).abs() <= (b - target).abs() => {}
                _ => best = Some(b),
            }
        }
        best
    }
}

/// Queryable catalog for one source title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaCatalog {
    pub title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(rename = "qualities")]
    pub video_qualities: Vec<VideoQuality>,
    #[serde(rename = "audioQualities")]
    pub audio_qualities: Vec<AudioQuality>,
}

impl MediaCatalog {
    pub fn audio_for_codec(&self, codec: &str) -> Option<&AudioQuality> {
        self.audio_qualities
            .iter()
            .find(|q| q.codec.eq_ignore_ascii_case(codec))
    }
}

/// The user's desired output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadRequestSpec {
    pub target_height_px: Option<u32>,
    pub target_frame_rate: Option<f64>,
    pub target_container: Option<String>,
    pub audio_only: bool,
    pub video_only: bool,
    pub target_audio_codec: Option<String>,
    pub target_bitrate_kbps: Option<f64>,
}

/// Which tracks the output carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Video plus best audio, no audio constraints
    Default,
    AudioOnly,
    VideoOnly,
    /// Video plus constrained audio (bitrate and/or codec)
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    Basic,
    /// Explicit container and/or audio codec
    Advanced,
}

/// Validated request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestMode {
    pub kind: OutputKind,
    pub detail: Detail,
}

impl RequestMode {
    /// Both a video and an audio track merged into one container
    pub fn is_combined(&self) -> bool {
        matches!(self.kind, OutputKind::Default | OutputKind::Combined)
    }

    pub fn wants_video(&self) -> bool {
        self.kind != OutputKind::AudioOnly
    }

    pub fn wants_audio(&self) -> bool {
        self.kind != OutputKind::VideoOnly
    }
}

/// Ceiling filter on the video track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoCeiling {
    pub max_height_px: u32,
    pub max_frame_rate: f64,
    /// Extension constraint (advanced mode, stream containers only)
    pub container: Option<String>,
}

impl VideoCeiling {
    pub fn filter(&self) -> String {
        let mut filter = format!(
            "bestvideo[height<={}][fps<={}]",
            self.max_height_px, self.max_frame_rate
        );
        if let Some(ext) = &self.container {
            filter.push_str(&format!("[ext={}]", ext));
        }
        filter
    }
}

/// Audio stream picked from the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChosenAudio {
    pub codec: String,
    pub bitrate_kbps: f64,
}

impl ChosenAudio {
    pub fn filter(&self) -> String {
        // +1 absorbs fractional abr values reported by the source
        format!(
            "bestaudio[acodec={}][abr<={}]",
            self.codec,
            self.bitrate_kbps.round() as u64 + 1
        )
    }
}

/// Output of the format selector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub mode: RequestMode,
    pub chosen_video: Option<VideoCeiling>,
    pub chosen_audio: Option<ChosenAudio>,
    pub format_expression: String,
    pub output_container: String,
}

/// Video tracks are only ever remuxed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum VideoAction {
    Copy,
}

/// Audio track post-processing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum TrackAction {
    Copy,
    Transcode { codec: String, bitrate_kbps: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostProcessingPlan {
    pub video: Option<VideoAction>,
    pub audio: Option<TrackAction>,
}

impl PostProcessingPlan {
    /// ffmpeg argument fragments, video first
    pub fn directives(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(VideoAction::Copy) = self.video {
            out.push("-c:v copy".to_string());
        }
        if let Some(action) = &self.audio {
            out.push(match action {
                TrackAction::Copy => "-c:a copy".to_string(),
                TrackAction::Transcode { codec, bitrate_kbps } => {
                    format!("-c:a {} -b:a {}k", ffmpeg_encoder(codec), bitrate_kbps)
                }
            });
        }
        out
    }

    pub fn audio_transcode(&self) -> Option<(&str, u32)> {
        match &self.audio {
            Some(TrackAction::Transcode { codec, bitrate_kbps }) => Some((codec, *bitrate_kbps)),
            _ => None,
        }
    }
}

/// ffmpeg encoder for a codec name; the native opus/vorbis encoders are experimental
fn ffmpeg_encoder(codec: &str) -> &str {
    match codec {
        "opus" => "libopus",
        "vorbis" => "libvorbis",
        "mp3" => "libmp3lame",
        other => other,
    }
}

/// A finished download awaiting retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyDownload {
    pub filename: String,
    /// Request id; picks this exact file when several share `filename`
    pub token: Uuid,
}

/// Final instruction handed to the fetch/transcode engine
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadInstruction {
    pub url: String,
    pub output_path: PathBuf,
    pub format_expression: String,
    /// Set only when a video and an audio track are merged
    pub merge_container: Option<String>,
    pub output_container: String,
    pub post_processing: PostProcessingPlan,
}

impl DownloadInstruction {
    pub fn directives(&self) -> Vec<String> {
        self.post_processing.directives()
    }
}
