// yt-dlp engine backend
//
// Translates a DownloadInstruction into one yt-dlp invocation. ffmpeg is
// driven through yt-dlp's post-processor arguments.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::DownloadInstruction;
use crate::downloader::traits::DownloaderBackend;
use crate::downloader::utils::{
    find_binary, proxy_args, run_output_with_timeout, stderr_summary,
};

pub struct YtDlpBackend {
    ytdlp_bin: String,
    proxy: Option<String>,
    cookies_path: Option<String>,
    timeout_secs: u64,
}

impl YtDlpBackend {
    pub fn new(ytdlp_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            proxy: None,
            cookies_path: None,
            timeout_secs,
        }
    }

    pub fn discover(configured: Option<&str>, timeout_secs: u64) -> Self {
        Self::new(find_binary("yt-dlp", configured), timeout_secs)
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    /// Output template: same directory and stem, extension chosen by yt-dlp.
    /// Merges and extraction rewrite the extension, so it is settled afterwards.
    fn output_template(path: &Path) -> String {
        path.with_extension("%(ext)s").to_string_lossy().into_owned()
    }

    fn build_args(&self, instruction: &DownloadInstruction) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            instruction.format_expression.clone(),
            "-o".to_string(),
            Self::output_template(&instruction.output_path),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
        ];

        args.extend(proxy_args(self.proxy.as_deref()));
        if let Some(path) = &self.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        let plan = &instruction.post_processing;
        if let Some(container) = &instruction.merge_container {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
            args.push("--postprocessor-args".to_string());
            args.push(format!("Merger+ffmpeg_o:{}", instruction.directives().join(" ")));
        } else if let (None, Some((codec, bitrate))) = (&plan.video, plan.audio_transcode()) {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(audio_format_arg(codec, &instruction.output_container).to_string());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", bitrate));
        } else {
            args.push("--remux-video".to_string());
            args.push(instruction.output_container.clone());
        }

        args.push("--".to_string());
        args.push(instruction.url.clone());
        args
    }
}

/// yt-dlp names AAC-in-MP4 extraction "m4a"
fn audio_format_arg<'a>(codec: &'a str, container: &'a str) -> &'a str {
    if codec.eq_ignore_ascii_case("aac") && container.eq_ignore_ascii_case("m4a") {
        container
    } else {
        codec
    }
}

/// Make sure the produced file sits at exactly `expected`.
///
/// yt-dlp may leave the result under a different extension; the single file
/// sharing the stem in the request directory is moved into place.
async fn settle_output(expected: &Path) -> Result<(), DownloadError> {
    if tokio::fs::try_exists(expected).await.unwrap_or(false) {
        return Ok(());
    }
    let (Some(dir), Some(stem)) = (expected.parent(), expected.file_stem()) else {
        return Err(DownloadError::DownloadFailed(
            "invalid output path".to_string(),
        ));
    };

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DownloadError::DownloadFailed(format!("output directory missing: {}", e)))?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_partial = path
            .extension()
            .map_or(false, |ext| ext == "part" || ext == "ytdl");
        if path.file_stem() == Some(stem) && !is_partial {
            debug!(from = %path.display(), to = %expected.display(), "Settling output file");
            tokio::fs::rename(&path, expected)
                .await
                .map_err(|e| DownloadError::DownloadFailed(format!("failed to move output: {}", e)))?;
            return Ok(());
        }
    }

    Err(DownloadError::DownloadFailed(
        "engine finished without producing an output file".to_string(),
    ))
}

#[async_trait]
impl DownloaderBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn execute(&self, instruction: &DownloadInstruction) -> Result<(), DownloadError> {
        let args = self.build_args(instruction);
        info!(
            backend = self.name(),
            url = %instruction.url,
            format = %instruction.format_expression,
            "Starting download"
        );
        debug!("Running {} {}", self.ytdlp_bin, args.join(" "));

        let output = run_output_with_timeout(&self.ytdlp_bin, args, self.timeout_secs)
            .await
            .map_err(|e| match e {
                DownloadError::ToolNotFound(msg) | DownloadError::ExecutionError(msg) => {
                    DownloadError::DownloadFailed(msg)
                }
                other => other,
            })?;

        if !output.status.success() {
            let detail = stderr_summary(&output.stderr);
            warn!(backend = self.name(), url = %instruction.url, "yt-dlp failed: {}", detail);
            return Err(DownloadError::DownloadFailed(detail));
        }

        settle_output(&instruction.output_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{PostProcessingPlan, TrackAction, VideoAction};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn instruction(
        merge: Option<&str>,
        container: &str,
        video: Option<VideoAction>,
        audio: Option<TrackAction>,
    ) -> DownloadInstruction {
        DownloadInstruction {
            url: "https://youtu.be/abc".into(),
            output_path: PathBuf::from("/dl/req/clip").with_extension(container),
            format_expression: "EXPR".into(),
            merge_container: merge.map(String::from),
            output_container: container.into(),
            post_processing: PostProcessingPlan { video, audio },
        }
    }

    fn backend() -> YtDlpBackend {
        YtDlpBackend::new("yt-dlp", 60)
    }

    #[test]
    fn test_merge_args() {
        let instr = instruction(
            Some("mp4"),
            "mp4",
            Some(VideoAction::Copy),
            Some(TrackAction::Transcode {
                codec: "aac".into(),
                bitrate_kbps: 192,
            }),
        );
        let args = backend()
            .with_proxy(Some("socks5h://127.0.0.1:1080".into()))
            .build_args(&instr);

        assert_eq!(
            args,
            vec![
                "-f",
                "EXPR",
                "-o",
                "/dl/req/clip.%(ext)s",
                "--no-playlist",
                "--no-warnings",
                "--newline",
                "--proxy",
                "socks5h://127.0.0.1:1080",
                "--merge-output-format",
                "mp4",
                "--postprocessor-args",
                "Merger+ffmpeg_o:-c:v copy -c:a aac -b:a 192k",
                "--",
                "https://youtu.be/abc",
            ]
        );
    }

    #[test]
    fn test_audio_transcode_args() {
        let instr = instruction(
            None,
            "m4a",
            None,
            Some(TrackAction::Transcode {
                codec: "aac".into(),
                bitrate_kbps: 128,
            }),
        );
        let joined = backend().build_args(&instr).join(" ");
        assert!(joined.contains("-x --audio-format m4a --audio-quality 128K"));
        assert!(!joined.contains("--merge-output-format"));
    }

    #[test]
    fn test_single_track_copy_remuxes() {
        let audio = instruction(None, "webm", None, Some(TrackAction::Copy));
        let joined = backend().build_args(&audio).join(" ");
        assert!(joined.contains("--remux-video webm"));
        assert!(!joined.contains("-x"));

        let video = instruction(None, "mkv", Some(VideoAction::Copy), None);
        let joined = backend()
            .with_cookies_path(Some("/c.txt".into()))
            .build_args(&video)
            .join(" ");
        assert!(joined.contains("--remux-video mkv"));
        assert!(joined.contains("--cookies /c.txt"));
    }

    #[test]
    fn test_audio_format_arg() {
        assert_eq!(audio_format_arg("aac", "m4a"), "m4a");
        assert_eq!(audio_format_arg("mp3", "mp3"), "mp3");
        assert_eq!(audio_format_arg("opus", "webm"), "opus");
    }

    #[tokio::test]
    async fn test_settle_output_renames_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.webm.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("clip.mkv"), b"data").unwrap();
        let expected = dir.path().join("clip.mp4");

        settle_output(&expected).await.unwrap();
        assert_eq!(std::fs::read(&expected).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_settle_output_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = settle_output(&dir.path().join("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, DownloadError::DownloadFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_download_failed() {
        let instr = instruction(None, "mp4", Some(VideoAction::Copy), None);
        let err = YtDlpBackend::new("/nonexistent/yt-dlp", 5)
            .execute(&instr)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::DownloadFailed(_)));
    }
}
