//! Saving produced files (videos, project documents) for the user.

use std::path::{Path, PathBuf};

use crate::error::{SlidecastError, SlidecastResult};

/// Destination for finished artifacts.
///
/// The payload is only borrowed for the duration of the call; a sink must
/// not hold on to it after `save` returns.
pub trait ArtifactSink: Send + Sync {
    /// Persist `payload` under `filename`. Returns where it ended up.
    fn save(&self, filename: &str, mime_type: &str, payload: &[u8]) -> SlidecastResult<PathBuf>;
}

/// Writes artifacts into a download directory.
///
/// An existing file is never overwritten: `clip.webm` becomes
/// `clip (1).webm`, `clip (2).webm`, and so on.
#[derive(Debug, Clone)]
pub struct DownloadDirSink {
    dir: PathBuf,
}

impl DownloadDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DownloadDirSink {
    fn save(&self, filename: &str, mime_type: &str, payload: &[u8]) -> SlidecastResult<PathBuf> {
        if filename.is_empty() || filename.contains(['/', '\\']) {
            return Err(SlidecastError::save(format!(
                "Refusing to save under unsafe name {filename:?}"
            )));
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            SlidecastError::save(format!("Cannot create {}: {e}", self.dir.display()))
        })?;

        let path = unique_path(&self.dir, filename);
        std::fs::write(&path, payload)
            .map_err(|e| SlidecastError::save(format!("Cannot write {}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            mime_type,
            bytes = payload.len(),
            "Artifact saved"
        );
        Ok(path)
    }
}

fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    };

    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_creates_directory_and_writes_payload() {
        let dir = fresh_dir("slidecast_test_sink_write");
        let sink = DownloadDirSink::new(&dir);

        let path = sink.save("talk_720p.webm", "video/webm", b"abc").unwrap();
        assert_eq!(path, dir.join("talk_720p.webm"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = fresh_dir("slidecast_test_sink_unique");
        let sink = DownloadDirSink::new(&dir);

        let first = sink.save("deck.webm", "video/webm", b"1").unwrap();
        let second = sink.save("deck.webm", "video/webm", b"2").unwrap();
        let third = sink.save("deck.webm", "video/webm", b"3").unwrap();

        assert_eq!(first, dir.join("deck.webm"));
        assert_eq!(second, dir.join("deck (1).webm"));
        assert_eq!(third, dir.join("deck (2).webm"));
        assert_eq!(std::fs::read(&first).unwrap(), b"1");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_rejects_path_separators() {
        let sink = DownloadDirSink::new(std::env::temp_dir());
        let err = sink
            .save("../escape.webm", "video/webm", b"x")
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Save { .. }));
    }
}
