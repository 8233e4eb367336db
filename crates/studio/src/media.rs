use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, StudioError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    /// Classify a MIME type by its top-level category
    ///
    /// Only `video/*`, `image/*` and `audio/*` are accepted. Parameters such as
    /// `; codecs=...` are ignored. Anything else, including malformed strings,
    /// is rejected with `UnsupportedKind`.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();

        let captures = mime_pattern()
            .captures(essence)
            .ok_or_else(|| StudioError::unsupported_kind(mime))?;

        match captures[1].to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "image" => Ok(MediaKind::Image),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(StudioError::unsupported_kind(mime)),
        }
    }

    /// Whether assets of this kind have a timeline that can be trimmed
    pub fn has_timeline(self) -> bool {
        !matches!(self, MediaKind::Image)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        };
        f.write_str(name)
    }
}

fn mime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)/([A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*)$")
            .expect("MIME pattern is a valid regex")
    })
}

/// The two inputs of a lip-sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadSlot {
    /// The face to animate: a video or a still image
    Visual,
    /// The speech track
    Audio,
}

impl UploadSlot {
    pub fn accepts(self, kind: MediaKind) -> bool {
        match self {
            UploadSlot::Visual => matches!(kind, MediaKind::Video | MediaKind::Image),
            UploadSlot::Audio => matches!(kind, MediaKind::Audio),
        }
    }
}

impl fmt::Display for UploadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSlot::Visual => f.write_str("video/image"),
            UploadSlot::Audio => f.write_str("audio"),
        }
    }
}

/// An uploaded file as seen by the studio.
///
/// The bytes stay with whoever uploaded them; the studio only keeps the
/// descriptive attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub name: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
    /// Unknown until the asset has been probed; always absent for images
    pub duration_seconds: Option<f64>,
}

impl MediaAsset {
    pub fn new(name: impl Into<String>, size_bytes: u64, kind: MediaKind) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            kind,
            duration_seconds: None,
        }
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }

    /// Build an asset from a MIME type reported by the upload provider
    pub fn from_mime(name: impl Into<String>, size_bytes: u64, mime: &str) -> Result<Self> {
        let kind = MediaKind::from_mime(mime)?;
        Ok(Self::new(name, size_bytes, kind))
    }
}
