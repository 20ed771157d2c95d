//! Turning accumulated chunks into a saved video file.

use std::path::PathBuf;

use slidecast_common::artifact::ArtifactSink;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::sanitize_filename;

/// A finished recording that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedVideo {
    pub filename: String,
    pub mime_type: String,
    pub payload: Vec<u8>,
}

impl FinalizedVideo {
    pub fn save(&self, sink: &dyn ArtifactSink) -> SlidecastResult<PathBuf> {
        sink.save(&self.filename, &self.mime_type, &self.payload)
    }
}

#[derive(Debug)]
pub enum FinalizeOutcome {
    Saved { path: PathBuf, bytes: usize },

    /// The sink refused the file; the payload is kept for a retry.
    Retained {
        video: FinalizedVideo,
        error: SlidecastError,
    },
}

/// Join chunks in arrival order.
pub fn concat_chunks(chunks: Vec<Vec<u8>>) -> Vec<u8> {
    let total = chunks.iter().map(Vec::len).sum();
    chunks
        .into_iter()
        .fold(Vec::with_capacity(total), |mut payload, chunk| {
            payload.extend_from_slice(&chunk);
            payload
        })
}

/// `{base}{suffix}{extension}`, e.g. `talk_720p.webm`. `base` is sanitized
/// again here, whatever path the settings took.
pub fn output_filename(base: &str, suffix: &str, extension: &str) -> String {
    format!("{}{suffix}{extension}", sanitize_filename(base))
}

pub fn finalize(
    chunks: Vec<Vec<u8>>,
    mime_type: &str,
    filename: String,
    sink: &dyn ArtifactSink,
) -> FinalizeOutcome {
    let video = FinalizedVideo {
        filename,
        mime_type: mime_type.to_string(),
        payload: concat_chunks(chunks),
    };

    match video.save(sink) {
        Ok(path) => {
            let bytes = video.payload.len();
            tracing::info!(path = %path.display(), bytes, mime_type, "Recording saved");
            FinalizeOutcome::Saved { path, bytes }
        }
        Err(error) => {
            tracing::warn!(
                filename = %video.filename,
                error = %error,
                "Recording could not be saved; keeping payload for retry"
            );
            FinalizeOutcome::Retained { video, error }
        }
    }
}
