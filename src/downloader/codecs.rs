// Codec table - allow-list, transcode targets, UI labels, container rules
//
// Immutable data shared by the format selector, the post-processing planner
// and the HTTP label layer. Build once and pass by reference.

use std::collections::HashMap;

/// What to do with a codec the output pipeline meets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    /// Codec to re-encode into when a transcode is needed
    pub transcode_target_codec: String,
    /// Natural file extension for audio-only output of this codec
    pub default_container_extension: String,
    /// Human-readable name for the UI
    pub label: String,
}

impl CodecCapability {
    fn new(target: &str, ext: &str, label: &str) -> Self {
        Self {
            transcode_target_codec: target.to_string(),
            default_container_extension: ext.to_string(),
            label: label.to_string(),
        }
    }
}

/// Audio codecs a container can hold, and what to re-encode into otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAudio {
    codecs: Vec<String>,
    pub transcode_target_codec: String,
}

impl ContainerAudio {
    pub fn new(codecs: &[&str], transcode_target_codec: &str) -> Self {
        Self {
            codecs: codecs.iter().map(|c| c.to_ascii_lowercase()).collect(),
            transcode_target_codec: transcode_target_codec.to_string(),
        }
    }

    fn holds(&self, codec: &str) -> bool {
        self.codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }
}

#[derive(Debug, Clone)]
pub struct CodecTable {
    /// Keyed by lowercase codec id
    capabilities: HashMap<String, CodecCapability>,
    /// Used for codecs outside the allow-list
    fallback: CodecCapability,
    video_containers: Vec<String>,
    /// Containers sources actually serve streams in (usable as ext filter)
    stream_containers: Vec<String>,
    /// Containers without an entry take anything on the allow-list
    container_audio: HashMap<String, ContainerAudio>,
}

lazy_static::lazy_static! {
    static ref SHARED: CodecTable = CodecTable::default();
}

impl CodecTable {
    pub fn new(
        capabilities: HashMap<String, CodecCapability>,
        fallback: CodecCapability,
        video_containers: Vec<String>,
        stream_containers: Vec<String>,
    ) -> Self {
        let capabilities = capabilities
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            capabilities,
            fallback,
            video_containers,
            stream_containers,
            container_audio: HashMap::new(),
        }
    }

    /// Restrict the audio codecs `container` can carry
    pub fn with_container_audio(mut self, container: &str, audio: ContainerAudio) -> Self {
        self.container_audio.insert(container.to_ascii_lowercase(), audio);
        self
    }

    /// Process-wide default table
    pub fn shared() -> &'static CodecTable {
        &SHARED
    }

    /// Codec can be carried without transcoding
    pub fn is_acceptable(&self, codec: &str) -> bool {
        self.capabilities.contains_key(&codec.to_ascii_lowercase())
    }

    /// Capability for `codec`, or the fallback entry for unknown codecs
    pub fn capability(&self, codec: &str) -> &CodecCapability {
        self.capabilities
            .get(&codec.to_ascii_lowercase())
            .unwrap_or(&self.fallback)
    }

    /// Codec can be muxed into `container` without re-encoding
    pub fn container_accepts(&self, container: &str, codec: &str) -> bool {
        match self.container_audio.get(&container.to_ascii_lowercase()) {
            Some(audio) => audio.holds(codec),
            None => self.is_acceptable(codec),
        }
    }

    /// Codec to re-encode `codec` into when it does not fit `container`
    pub fn transcode_target(&self, container: &str, codec: &str) -> &str {
        match self.container_audio.get(&container.to_ascii_lowercase()) {
            Some(audio) => &audio.transcode_target_codec,
            None => &self.capability(codec).transcode_target_codec,
        }
    }

    pub fn fallback(&self) -> &CodecCapability {
        &self.fallback
    }

    pub fn label(&self, codec: &str) -> String {
        match self.capabilities.get(&codec.to_ascii_lowercase()) {
            Some(cap) => cap.label.clone(),
            None => codec.to_string(),
        }
    }

    pub fn is_video_container(&self, ext: &str) -> bool {
        self.video_containers.iter().any(|c| c.eq_ignore_ascii_case(ext))
    }

    pub fn is_stream_container(&self, ext: &str) -> bool {
        self.stream_containers.iter().any(|c| c.eq_ignore_ascii_case(ext))
    }

    pub fn video_containers(&self) -> &[String] {
        &self.video_containers
    }
}

const AAC_IDS: [&str; 4] = ["aac", "mp4a.40.2", "mp4a.40.5", "mp4a.40.29"];

impl Default for CodecTable {
    fn default() -> Self {
        let aac = CodecCapability::new("aac", "m4a", "AAC");
        let mut capabilities = HashMap::new();
        for id in AAC_IDS {
            capabilities.insert(id.to_string(), aac.clone());
        }
        capabilities.insert("mp3".to_string(), CodecCapability::new("mp3", "mp3", "MP3"));
        capabilities.insert("opus".to_string(), CodecCapability::new("opus", "webm", "Opus"));
        capabilities.insert(
            "vorbis".to_string(),
            CodecCapability::new("vorbis", "ogg", "Vorbis"),
        );

        Self::new(
            capabilities,
            aac,
            ["mp4", "webm", "mkv", "mov"].map(String::from).to_vec(),
            ["mp4", "webm"].map(String::from).to_vec(),
        )
        .with_container_audio(
            "mp4",
            ContainerAudio::new(&[&AAC_IDS[..], &["mp3", "opus"][..]].concat(), "aac"),
        )
        .with_container_audio(
            "mov",
            ContainerAudio::new(&[&AAC_IDS[..], &["mp3"][..]].concat(), "aac"),
        )
        .with_container_audio("m4a", ContainerAudio::new(&AAC_IDS, "aac"))
        .with_container_audio("webm", ContainerAudio::new(&["opus", "vorbis"], "opus"))
        .with_container_audio("ogg", ContainerAudio::new(&["vorbis", "opus"], "vorbis"))
        .with_container_audio("mp3", ContainerAudio::new(&["mp3"], "mp3"))
    }
}
