//! Decides whether a resource carries the elementary stream the engine processes.
//!
//! [`FormatClassifier`] works on already resolved track metadata and never performs I/O.
//! [`ManifestClassifier`] answers the same question for a bare resource URI by looking it
//! up in a [`ManifestSnapshot`](crate::manifest::ManifestSnapshot).

mod manifest;

pub use manifest::ManifestClassifier;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::TargetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Text,
    Image,
    Unknown,
}

impl TrackKind {
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        let Some(mime_type) = mime_type else {
            return Self::Unknown;
        };

        let mime_type = mime_type.trim().to_ascii_lowercase();
        let top_level = mime_type.split_once('/').map_or(mime_type.as_str(), |(top, _)| top);
        match top_level {
            "audio" => Self::Audio,
            "video" => Self::Video,
            "text" => Self::Text,
            "image" => Self::Image,
            "application" if is_text_application(&mime_type) => Self::Text,
            _ => Self::Unknown,
        }
    }

    /// `Some(true)` for audio, `Some(false)` for any other known kind and `None` when the
    /// kind could not be determined.
    pub fn is_audio(self) -> Option<bool> {
        match self {
            Self::Audio => Some(true),
            Self::Video | Self::Text | Self::Image => Some(false),
            Self::Unknown => None,
        }
    }
}

fn is_text_application(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "application/ttml+xml" | "application/x-subrip" | "application/cea-608"
    )
}

/// The container and sample formats of the stream the engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStream {
    pub container_mime: String,
    pub sample_mime: String,
    pub segment_extensions: Vec<String>,
}

impl TargetStream {
    pub fn matches(&self, container_mime: Option<&str>, sample_mime: Option<&str>) -> bool {
        container_mime == Some(self.container_mime.as_str())
            && sample_mime == Some(self.sample_mime.as_str())
    }

    /// Whether `path` looks like a fragmented container resource.
    pub fn is_segment_path(&self, path: &str) -> bool {
        self.segment_extensions
            .iter()
            .any(|extension| path.ends_with(extension.as_str()))
    }
}

impl Default for TargetStream {
    fn default() -> Self {
        TargetConfig::default().into()
    }
}

impl From<TargetConfig> for TargetStream {
    fn from(config: TargetConfig) -> Self {
        Self {
            container_mime: config.container_mime,
            sample_mime: config.sample_mime,
            segment_extensions: config.segment_extensions,
        }
    }
}

/// Format of the track a chunk is requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFormat {
    pub container_mime: Option<String>,
    pub sample_mime: Option<String>,
    pub kind: Option<TrackKind>,
}

impl TrackFormat {
    pub fn new(container_mime: impl Into<String>, sample_mime: impl Into<String>) -> Self {
        let container_mime = container_mime.into();
        let kind = TrackKind::from_mime_type(Some(&container_mime));
        Self {
            container_mime: Some(container_mime),
            sample_mime: Some(sample_mime.into()),
            kind: Some(kind),
        }
    }
}

/// Classifies a track from its resolved format metadata.
#[derive(Debug, Clone, Default)]
pub struct FormatClassifier {
    target: TargetStream,
}

impl FormatClassifier {
    pub fn new(target: TargetStream) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &TargetStream {
        &self.target
    }

    /// Missing container or sample information classifies as "not target".
    pub fn is_target(&self, format: &TrackFormat) -> bool {
        let (Some(container_mime), Some(sample_mime)) =
            (format.container_mime.as_deref(), format.sample_mime.as_deref())
        else {
            tracing::warn!(?format, "Track format is incomplete, treating as non target");
            return false;
        };

        if format.kind.and_then(TrackKind::is_audio) == Some(false) {
            return false;
        }
        self.target.matches(Some(container_mime), Some(sample_mime))
    }
}

/// Decides from a resource URI alone whether it carries the target stream.
pub trait SourceDetector: Send + Sync {
    fn is_target(&self, uri: &Url) -> bool;
}
