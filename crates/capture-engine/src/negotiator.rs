//! Quality/format negotiation.
//!
//! Picks the best MIME type the platform says it can encode for the chosen
//! container, and combines it with the tier's bitrate and frame rate.

use slidecast_common::error::SlidecastError;
use slidecast_project_model::{ContainerFormat, QualityTier};

use crate::backend::CodecSupport;

/// Container assumed to work everywhere.
pub const BASELINE_MIME_TYPE: &str = "video/webm";

const WEBM_CANDIDATES: [&str; 3] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

const MP4_CANDIDATES: [&str; 3] = [
    "video/mp4;codecs=avc1.42E01E,mp4a.40.2",
    "video/mp4;codecs=avc1",
    "video/mp4",
];

/// Candidate MIME types for `format`, most specific first.
pub fn candidate_mime_types(format: ContainerFormat) -> &'static [&'static str] {
    match format {
        ContainerFormat::Webm => &WEBM_CANDIDATES,
        ContainerFormat::Mp4 => &MP4_CANDIDATES,
    }
}

/// How the MIME type was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The first candidate was supported.
    Preferred,
    /// A later candidate, or the baseline.
    Fallback,
    /// Nothing was reported as supported; the baseline is used blind.
    Unverified,
}

/// Resolved encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub mime_type: String,
    pub video_bits_per_second: u64,
    pub frame_rate: u32,
    pub outcome: NegotiationOutcome,
}

impl EncoderConfig {
    /// `.mp4` for MP4 containers, `.webm` for everything else.
    pub fn file_extension(&self) -> &'static str {
        if self.mime_type.starts_with("video/mp4") {
            ".mp4"
        } else {
            ".webm"
        }
    }

    /// The MIME type without its parameters.
    pub fn container_mime(&self) -> String {
        parse_mime(&self.mime_type).container
    }
}

/// Resolve an encoder configuration. Never fails.
pub fn resolve(
    platform: &(impl CodecSupport + ?Sized),
    tier: QualityTier,
    preferred: ContainerFormat,
) -> EncoderConfig {
    let preset = tier.preset();
    let candidates = candidate_mime_types(preferred);

    let chosen = candidates
        .iter()
        .position(|mime| platform.is_type_supported(mime))
        .map(|idx| {
            let outcome = if idx == 0 {
                NegotiationOutcome::Preferred
            } else {
                NegotiationOutcome::Fallback
            };
            (candidates[idx], outcome)
        });

    let (mime_type, outcome) = match chosen {
        Some(found) => found,
        None if platform.is_type_supported(BASELINE_MIME_TYPE) => {
            (BASELINE_MIME_TYPE, NegotiationOutcome::Fallback)
        }
        None => {
            let err = SlidecastError::encoder_unavailable(format!(
                "no {preferred} candidate or baseline reported as supported"
            ));
            tracing::warn!(error = %err, "Using unverified baseline encoder configuration");
            (BASELINE_MIME_TYPE, NegotiationOutcome::Unverified)
        }
    };

    tracing::info!(
        %tier,
        format = %preferred,
        mime_type,
        ?outcome,
        "Encoder configuration resolved"
    );

    EncoderConfig {
        mime_type: mime_type.to_string(),
        video_bits_per_second: preset.video_bits_per_second,
        frame_rate: preset.frame_rate,
        outcome,
    }
}

/// A MIME type split into container and codec list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeSpec {
    pub container: String,
    pub codecs: Vec<String>,
}

/// Parse `type/subtype; codecs="a, b"`. The container is lowercased;
/// codec names keep their case.
pub fn parse_mime(mime_type: &str) -> MimeSpec {
    let mut parts = mime_type.split(';');
    let container = parts
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let codecs = parts
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("codecs")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .flat_map(|list| {
            list.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    MimeSpec { container, codecs }
}
