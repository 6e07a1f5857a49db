// Post-processing planner
//
// Decides, per selected track, whether the engine copies the stream as-is
// or re-encodes it. Video is always copied. Audio is copied when the output
// container can hold its codec and transcoded to the container's codec
// otherwise.

use tracing::debug;

use super::codecs::CodecTable;
use super::models::{PostProcessingPlan, SelectionResult, TrackAction, VideoAction};

pub struct PostProcessingPlanner<'a> {
    codecs: &'a CodecTable,
}

impl<'a> PostProcessingPlanner<'a> {
    pub fn new(codecs: &'a CodecTable) -> Self {
        Self { codecs }
    }

    /// Plan post-processing for a selection.
    ///
    /// `requested_bitrate_kbps` is the caller's target; when absent the
    /// bitrate of the chosen stream is kept for a transcode.
    pub fn plan(
        &self,
        selection: &SelectionResult,
        requested_bitrate_kbps: Option<f64>,
    ) -> PostProcessingPlan {
        let video = selection.chosen_video.as_ref().map(|_| VideoAction::Copy);
        let container = selection.output_container.as_str();

        let audio = selection.chosen_audio.as_ref().map(|chosen| {
            if self.codecs.container_accepts(container, &chosen.codec) {
                return TrackAction::Copy;
            }
            let target = self.codecs.transcode_target(container, &chosen.codec);
            let bitrate = requested_bitrate_kbps.unwrap_or(chosen.bitrate_kbps);
            debug!(
                from = %chosen.codec,
                to = %target,
                %container,
                bitrate,
                "Audio codec needs transcoding"
            );
            TrackAction::Transcode {
                codec: target.to_string(),
                bitrate_kbps: bitrate.round().max(1.0) as u32,
            }
        });

        PostProcessingPlan { video, audio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{ChosenAudio, Detail, OutputKind, RequestMode, VideoCeiling};
    use pretty_assertions::assert_eq;

    fn selection(kind: OutputKind, audio: Option<(&str, f64)>, container: &str) -> SelectionResult {
        let video = (kind != OutputKind::AudioOnly).then(|| VideoCeiling {
            max_height_px: 1080,
            max_frame_rate: 30.0,
            container: None,
        });
        SelectionResult {
            mode: RequestMode {
                kind,
                detail: Detail::Basic,
            },
            chosen_video: video,
            chosen_audio: audio.map(|(codec, bitrate)| ChosenAudio {
                codec: codec.to_string(),
                bitrate_kbps: bitrate,
            }),
            format_expression: String::new(),
            output_container: container.into(),
        }
    }

    fn planner() -> PostProcessingPlanner<'static> {
        PostProcessingPlanner::new(CodecTable::shared())
    }

    #[test]
    fn test_acceptable_codec_is_copied() {
        let plan = planner().plan(
            &selection(OutputKind::Default, Some(("mp4a.40.2", 128.0)), "mp4"),
            None,
        );
        assert_eq!(
            plan,
            PostProcessingPlan {
                video: Some(VideoAction::Copy),
                audio: Some(TrackAction::Copy),
            }
        );
        assert_eq!(plan.directives(), vec!["-c:v copy", "-c:a copy"]);
    }

    #[test]
    fn test_unsupported_codec_is_transcoded_at_requested_bitrate() {
        let plan = planner().plan(
            &selection(OutputKind::Combined, Some(("ec-3", 384.0)), "mp4"),
            Some(192.0),
        );
        assert_eq!(
            plan.audio,
            Some(TrackAction::Transcode {
                codec: "aac".into(),
                bitrate_kbps: 192,
            })
        );
        assert_eq!(plan.directives(), vec!["-c:v copy", "-c:a aac -b:a 192k"]);
    }

    #[test]
    fn test_transcode_keeps_chosen_bitrate_without_target() {
        let plan = planner().plan(
            &selection(OutputKind::AudioOnly, Some(("ac-3", 191.6)), "m4a"),
            None,
        );
        assert_eq!(plan.video, None);
        assert_eq!(plan.audio_transcode(), Some(("aac", 192)));
    }

    #[test]
    fn test_audio_only_copies_into_its_own_extension() {
        let cases = [
            ("opus", "webm"),
            ("vorbis", "ogg"),
            ("mp3", "mp3"),
            ("mp4a.40.5", "m4a"),
        ];
        for (codec, ext) in cases {
            let plan = planner().plan(
                &selection(OutputKind::AudioOnly, Some((codec, 128.0)), ext),
                None,
            );
            assert_eq!(plan.audio, Some(TrackAction::Copy), "{} in {}", codec, ext);
        }
    }

    #[test]
    fn test_aac_into_webm_is_transcoded_to_opus() {
        let plan = planner().plan(
            &selection(OutputKind::Combined, Some(("mp4a.40.2", 192.0)), "webm"),
            None,
        );
        assert_eq!(plan.audio_transcode(), Some(("opus", 192)));
        assert_eq!(plan.directives(), vec!["-c:v copy", "-c:a libopus -b:a 192k"]);
    }

    #[test]
    fn test_opus_into_mov_is_transcoded_to_aac() {
        let plan = planner().plan(
            &selection(OutputKind::Combined, Some(("opus", 160.0)), "mov"),
            Some(128.0),
        );
        assert_eq!(plan.directives(), vec!["-c:v copy", "-c:a aac -b:a 128k"]);
    }

    #[test]
    fn test_vorbis_into_mp4_is_transcoded() {
        let plan = planner().plan(
            &selection(OutputKind::Default, Some(("vorbis", 128.0)), "mp4"),
            None,
        );
        assert_eq!(plan.audio_transcode(), Some(("aac", 128)));
    }

    #[test]
    fn test_video_only_has_no_audio_action() {
        let plan = planner().plan(&selection(OutputKind::VideoOnly, None, "mp4"), None);
        assert_eq!(plan.directives(), vec!["-c:v copy"]);
    }
}
