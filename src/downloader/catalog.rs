// Stream catalog builder
//
// Normalizes the raw format list of one title into a deduplicated catalog:
// - video qualities grouped by height (frame rates + containers per height)
// - audio qualities grouped by codec (bitrates per codec)
//
// Pure data transformation, no I/O.

use std::collections::HashMap;

use super::errors::DownloadError;
use super::models::{
    AudioQuality, MediaCatalog, RawMetadata, RawStreamDescriptor, VideoQuality,
    DEFAULT_FRAME_RATE,
};

pub struct CatalogBuilder;

impl CatalogBuilder {
    /// Build a catalog from a fetched metadata blob
    pub fn from_metadata(meta: &RawMetadata) -> Result<MediaCatalog, DownloadError> {
        let formats = match &meta.formats {
            Some(f) if !f.is_empty() => f,
            _ => return Err(DownloadError::MetadataUnavailable),
        };

        let descriptors: Vec<RawStreamDescriptor> =
            formats.iter().map(RawStreamDescriptor::from).collect();

        Ok(Self::build(
            meta.title.clone().unwrap_or_default(),
            meta.thumbnail.clone().unwrap_or_default(),
            &descriptors,
        ))
    }

    pub fn build(
        title: String,
        thumbnail_url: String,
        descriptors: &[RawStreamDescriptor],
    ) -> MediaCatalog {
        MediaCatalog {
            title,
            thumbnail_url,
            video_qualities: Self::video_qualities(descriptors),
            audio_qualities: Self::audio_qualities(descriptors),
        }
    }

    fn video_qualities(descriptors: &[RawStreamDescriptor]) -> Vec<VideoQuality> {
        let mut qualities: Vec<VideoQuality> = Vec::new();
        let mut index: HashMap<u32, usize> = HashMap::new();

        for d in descriptors {
            let height = match d.height_px {
                Some(h) if h > 0 && d.video_codec.as_deref() != Some("none") => h,
                _ => continue,
            };
            // A zero or junk fps counts as unreported
            let fps = d
                .frame_rate
                .filter(|f| f.is_finite() && *f > 0.0)
                .unwrap_or(DEFAULT_FRAME_RATE);

            let slot = *index.entry(height).or_insert_with(|| {
                qualities.push(VideoQuality {
                    resolution_label: format!("{}p", height),
                    height_px: height,
                    available_frame_rates: Vec::new(),
                    available_containers: Vec::new(),
                });
                qualities.len() - 1
            });
            let quality = &mut qualities[slot];

            // List, not set: first-seen order drives default fps choice in the UI
            if !quality.available_frame_rates.contains(&fps) {
                quality.available_frame_rates.push(fps);
            }
            if let Some(ext) = &d.container {
                if !quality.available_containers.contains(ext) {
                    quality.available_containers.push(ext.clone());
                }
            }
        }

        qualities
    }

    fn audio_qualities(descriptors: &[RawStreamDescriptor]) -> Vec<AudioQuality> {
        let mut qualities: Vec<AudioQuality> = Vec::new();

        for d in descriptors {
            if d.has_video || !d.has_audio {
                continue;
            }
            let (codec, bitrate) = match (&d.audio_codec, d.average_bitrate_kbps) {
                (Some(c), Some(b)) if b > 0.0 => (c, b),
                _ => continue,
            };

            match qualities.iter_mut().find(|q| &q.codec == codec) {
                Some(q) => {
                    if !q.available_bitrates_kbps.contains(&bitrate) {
                        q.available_bitrates_kbps.push(bitrate);
                    }
                }
                None => qualities.push(AudioQuality {
                    codec: codec.clone(),
                    available_bitrates_kbps: vec![bitrate],
                }),
            }
        }

        qualities
    }
}
