// FormatSelector - request validation and stream selection
//
// Turns a DownloadRequestSpec + MediaCatalog into a SelectionResult:
// - Request mode decision table (validated up front, before any lookup)
// - Audio pick: closest bitrate / explicit codec / best acceptable codec
// - Video pick: ceiling filter (height <= H, fps <= F), resolved by yt-dlp
// - Output container and the final yt-dlp format expression

use tracing::debug;

use super::codecs::CodecTable;
use super::errors::DownloadError;
use super::models::{
    AudioQuality, ChosenAudio, Detail, DownloadRequestSpec, MediaCatalog, OutputKind,
    RequestMode, SelectionResult, VideoCeiling, DEFAULT_VIDEO_CONTAINER,
};

/// Format selector over an injected codec table
pub struct FormatSelector<'a> {
    codecs: &'a CodecTable,
}

impl<'a> FormatSelector<'a> {
    pub fn new(codecs: &'a CodecTable) -> Self {
        Self { codecs }
    }

    /// Classify the request into exactly one mode, rejecting anything the
    /// table does not cover.
    pub fn classify(&self, spec: &DownloadRequestSpec) -> Result<RequestMode, DownloadError> {
        if spec.audio_only && spec.video_only {
            return Err(DownloadError::invalid(
                "audio-only and video-only are mutually exclusive",
            ));
        }
        Self::check_numbers(spec)?;

        let has_audio_constraint =
            spec.target_bitrate_kbps.is_some() || spec.target_audio_codec.is_some();

        let mode = if spec.audio_only {
            if spec.target_height_px.is_some() || spec.target_frame_rate.is_some() {
                return Err(DownloadError::invalid(
                    "audio-only requests take no video dimensions",
                ));
            }
            if spec.target_container.is_some() {
                return Err(DownloadError::invalid(
                    "audio-only container follows the audio codec",
                ));
            }
            RequestMode {
                kind: OutputKind::AudioOnly,
                detail: if spec.target_audio_codec.is_some() {
                    Detail::Advanced
                } else {
                    Detail::Basic
                },
            }
        } else if spec.video_only {
            Self::require_dimensions(spec)?;
            if has_audio_constraint {
                return Err(DownloadError::invalid(
                    "video-only requests take no audio bitrate or codec",
                ));
            }
            RequestMode {
                kind: OutputKind::VideoOnly,
                detail: if spec.target_container.is_some() {
                    Detail::Advanced
                } else {
                    Detail::Basic
                },
            }
        } else {
            Self::require_dimensions(spec)?;
            RequestMode {
                kind: if has_audio_constraint {
                    OutputKind::Combined
                } else {
                    OutputKind::Default
                },
                detail: if spec.target_container.is_some() || spec.target_audio_codec.is_some() {
                    Detail::Advanced
                } else {
                    Detail::Basic
                },
            }
        };

        if let Some(container) = &spec.target_container {
            if !self.codecs.is_video_container(container) {
                return Err(DownloadError::invalid(format!(
                    "unsupported container '{}' (expected one of: {})",
                    container,
                    self.codecs.video_containers().join(", ")
                )));
            }
        }

        Ok(mode)
    }

    /// Compute the selection for a request against a catalog
    pub fn select(
        &self,
        catalog: &MediaCatalog,
        spec: &DownloadRequestSpec,
    ) -> Result<SelectionResult, DownloadError> {
        let mode = self.classify(spec)?;

        let video_container = mode.wants_video().then(|| Self::video_container(spec));
        let chosen_audio = if mode.wants_audio() {
            Some(self.select_audio(catalog, spec, video_container.as_deref())?)
        } else {
            None
        };
        let chosen_video = if mode.wants_video() {
            Some(self.select_video(catalog, spec, mode)?)
        } else {
            None
        };

        let format_expression = match (&chosen_video, &chosen_audio) {
            (Some(v), Some(a)) => format!("{}+{}", v.filter(), a.filter()),
            (Some(v), None) => v.filter(),
            (None, Some(a)) => a.filter(),
            (None, None) => return Err(DownloadError::invalid("request selects no tracks")),
        };
        let output_container = match video_container {
            Some(container) => container,
            None => self.audio_container(chosen_audio.as_ref()),
        };

        debug!(
            ?mode,
            %format_expression,
            %output_container,
            "Format selection complete"
        );

        Ok(SelectionResult {
            mode,
            chosen_video,
            chosen_audio,
            format_expression,
            output_container,
        })
    }

    /// Pick the audio stream.
    ///
    /// Without an explicit codec the pool narrows to allow-listed codecs the
    /// merge container can hold, widening to any allow-listed codec and then
    /// to every codec when nothing fits. Anything that does not fit gets
    /// transcoded by the planner.
    fn select_audio(
        &self,
        catalog: &MediaCatalog,
        spec: &DownloadRequestSpec,
        container: Option<&str>,
    ) -> Result<ChosenAudio, DownloadError> {
        let pool: Vec<&AudioQuality> = match &spec.target_audio_codec {
            Some(codec) => catalog.audio_for_codec(codec).into_iter().collect(),
            None => {
                let acceptable: Vec<&AudioQuality> = catalog
                    .audio_qualities
                    .iter()
                    .filter(|q| self.codecs.is_acceptable(&q.codec))
                    .collect();
                let fitting: Vec<&AudioQuality> = match container {
                    Some(c) => acceptable
                        .iter()
                        .copied()
                        .filter(|q| self.codecs.container_accepts(c, &q.codec))
                        .collect(),
                    None => Vec::new(),
                };
                if !fitting.is_empty() {
                    fitting
                } else if !acceptable.is_empty() {
                    acceptable
                } else {
                    debug!("No acceptable audio codec in catalog, falling back to any codec");
                    catalog.audio_qualities.iter().collect()
                }
            }
        };

        let picked = match spec.target_bitrate_kbps {
            Some(target) => Self::closest_to(&pool, target),
            None => Self::highest(&pool),
        };

        picked
            .map(|(q, bitrate)| ChosenAudio {
                codec: q.codec.clone(),
                bitrate_kbps: bitrate,
            })
            .ok_or(DownloadError::NoAudioAvailable)
    }

    /// Smallest |bitrate - target| across the pool; catalog order breaks ties
    fn closest_to<'q>(pool: &[&'q AudioQuality], target: f64) -> Option<(&'q AudioQuality, f64)> {
        let mut best: Option<(&AudioQuality, f64)> = None;
        for &q in pool {
            let Some(bitrate) = q.closest_bitrate(target) else {
                continue;
            };
            match best {
                Some((_, cur)) if (cur - target).abs() <= (bitrate - target).abs() => {}
                _ => best = Some((q, bitrate)),
            }
        }
        best
    }

    /// Globally highest bitrate across the pool; catalog order breaks ties
    fn highest<'q>(pool: &[&'q AudioQuality]) -> Option<(&'q AudioQuality, f64)> {
        let mut best: Option<(&AudioQuality, f64)> = None;
        for &q in pool {
            let Some(bitrate) = q.max_bitrate() else {
                continue;
            };
            match best {
                Some((_, cur)) if cur >= bitrate => {}
                _ => best = Some((q, bitrate)),
            }
        }
        best
    }

    fn select_video(
        &self,
        catalog: &MediaCatalog,
        spec: &DownloadRequestSpec,
        mode: RequestMode,
    ) -> Result<VideoCeiling, DownloadError> {
        let (max_height_px, max_frame_rate) = Self::require_dimensions(spec)?;

        // Ceiling, never exact match: the engine resolves the best stream under it
        let satisfiable = catalog.video_qualities.iter().any(|q| {
            q.height_px <= max_height_px
                && q.available_frame_rates.iter().any(|&f| f <= max_frame_rate)
        });
        if !satisfiable {
            return Err(DownloadError::NoVideoAvailable);
        }

        let container = match (&spec.target_container, mode.detail) {
            (Some(c), Detail::Advanced) if self.codecs.is_stream_container(c) => {
                Some(c.to_ascii_lowercase())
            }
            _ => None,
        };

        Ok(VideoCeiling {
            max_height_px,
            max_frame_rate,
            container,
        })
    }

    /// Merge/remux target for video-carrying modes
    fn video_container(spec: &DownloadRequestSpec) -> String {
        spec.target_container
            .as_deref()
            .unwrap_or(DEFAULT_VIDEO_CONTAINER)
            .to_ascii_lowercase()
    }

    /// Audio-only output follows the chosen codec
    fn audio_container(&self, audio: Option<&ChosenAudio>) -> String {
        let cap = match audio {
            Some(a) => self.codecs.capability(&a.codec),
            None => self.codecs.fallback(),
        };
        cap.default_container_extension.clone()
    }

    fn require_dimensions(spec: &DownloadRequestSpec) -> Result<(u32, f64), DownloadError> {
        let height = spec
            .target_height_px
            .ok_or_else(|| DownloadError::invalid("target height is required for video downloads"))?;
        let fps = spec.target_frame_rate.ok_or_else(|| {
            DownloadError::invalid("target frame rate is required for video downloads")
        })?;
        Ok((height, fps))
    }

    fn check_numbers(spec: &DownloadRequestSpec) -> Result<(), DownloadError> {
        if spec.target_height_px == Some(0) {
            return Err(DownloadError::invalid("target height must be positive"));
        }
        let positive = |v: Option<f64>| v.map_or(true, |x| x.is_finite() && x > 0.0);
        if !positive(spec.target_frame_rate) {
            return Err(DownloadError::invalid("target frame rate must be positive"));
        }
        if !positive(spec.target_bitrate_kbps) {
            return Err(DownloadError::invalid("target bitrate must be positive"));
        }
        Ok(())
    }
}
