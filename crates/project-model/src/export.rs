//! Export settings: quality presets, container formats, capture modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Filename used when sanitizing leaves nothing behind.
pub const FALLBACK_FILENAME: &str = "slideshow";

/// Named quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    #[serde(rename = "draft")]
    Draft,
    #[default]
    #[serde(rename = "hd")]
    Hd,
    #[serde(rename = "full-hd")]
    FullHd,
    #[serde(rename = "4k")]
    Uhd4k,
}

/// Encoding targets for one quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub tier: QualityTier,

    /// Target video bitrate in bits per second.
    pub video_bits_per_second: u64,

    /// Target frame rate.
    pub frame_rate: u32,

    /// Appended to the user's filename, before the extension.
    pub suffix: &'static str,

    /// Target capture dimensions in pixels (best-effort hint).
    pub width: u32,
    pub height: u32,
}

/// All presets, one per tier, in tier order.
pub static QUALITY_PRESETS: [QualityPreset; 4] = [
    QualityPreset {
        tier: QualityTier::Draft,
        video_bits_per_second: 2_500_000,
        frame_rate: 24,
        suffix: "_draft",
        width: 854,
        height: 480,
    },
    QualityPreset {
        tier: QualityTier::Hd,
        video_bits_per_second: 5_000_000,
        frame_rate: 30,
        suffix: "_720p",
        width: 1280,
        height: 720,
    },
    QualityPreset {
        tier: QualityTier::FullHd,
        video_bits_per_second: 8_000_000,
        frame_rate: 30,
        suffix: "_1080p",
        width: 1920,
        height: 1080,
    },
    QualityPreset {
        tier: QualityTier::Uhd4k,
        video_bits_per_second: 20_000_000,
        frame_rate: 30,
        suffix: "_4k",
        width: 3840,
        height: 2160,
    },
];

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::Draft, Self::Hd, Self::FullHd, Self::Uhd4k];

    fn index(self) -> usize {
        match self {
            Self::Draft => 0,
            Self::Hd => 1,
            Self::FullHd => 2,
            Self::Uhd4k => 3,
        }
    }

    /// The preset for this tier.
    pub fn preset(self) -> &'static QualityPreset {
        &QUALITY_PRESETS[self.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Hd => "hd",
            Self::FullHd => "full-hd",
            Self::Uhd4k => "4k",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown quality tier: {s}. Use: draft, hd, full-hd, 4k"))
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Webm,
    Mp4,
}

impl ContainerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webm" => Ok(Self::Webm),
            "mp4" => Ok(Self::Mp4),
            _ => Err(format!("Unknown format: {s}. Use: webm, mp4")),
        }
    }
}

/// What to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// The entire visible display, with system audio when available.
    WholeDisplay,
    /// Only the editor's rendering surface, video only.
    #[default]
    EditorSurface,
}

/// User choices for one export, fixed before a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub quality: QualityTier,
    pub format: ContainerFormat,
    pub capture_mode: CaptureMode,

    /// Base filename, already sanitized.
    #[serde(deserialize_with = "deserialize_filename")]
    pub filename: String,
}

impl ExportSettings {
    /// Build settings from raw user input. The filename is normalized.
    pub fn new(
        quality: QualityTier,
        format: ContainerFormat,
        capture_mode: CaptureMode,
        filename: &str,
    ) -> Self {
        Self {
            quality,
            format,
            capture_mode,
            filename: sanitize_filename(filename),
        }
    }

    pub fn preset(&self) -> &'static QualityPreset {
        self.quality.preset()
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::new(
            QualityTier::default(),
            ContainerFormat::default(),
            CaptureMode::default(),
            FALLBACK_FILENAME,
        )
    }
}

fn deserialize_filename<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(|raw| sanitize_filename(&raw))
}

/// Normalize user input to ASCII letters, digits, `-` and `_`.
///
/// Every other character becomes `_`. Surrounding whitespace is dropped
/// first; an input with nothing left maps to [`FALLBACK_FILENAME`].
pub fn sanitize_filename(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}
