//! Capture source selection: what gets recorded.

use std::sync::Arc;

use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::{CaptureMode, QualityPreset};

use crate::backend::{CaptureBackend, StreamConstraints, SurfaceHandle};

/// Opens the live stream for a capture mode.
pub struct CaptureSourceSelector<B: CaptureBackend> {
    backend: Arc<B>,
    surface: Option<SurfaceHandle>,
}

impl<B: CaptureBackend> Clone for CaptureSourceSelector<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            surface: self.surface.clone(),
        }
    }
}

impl<B: CaptureBackend> CaptureSourceSelector<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            surface: None,
        }
    }

    /// Attach (or with `None`, detach) the editor's rendering surface.
    pub fn set_surface(&mut self, surface: Option<SurfaceHandle>) {
        self.surface = surface;
    }

    pub fn surface(&self) -> Option<&SurfaceHandle> {
        self.surface.as_ref()
    }

    /// Open a stream for `mode`. Every failure is reported as
    /// `CaptureStartFailed`.
    pub async fn open_stream(
        &self,
        mode: CaptureMode,
        preset: &QualityPreset,
    ) -> SlidecastResult<B::Stream> {
        let result = match mode {
            CaptureMode::WholeDisplay => {
                let constraints = StreamConstraints::from_preset(preset, true);
                self.backend.open_display_stream(constraints).await
            }
            CaptureMode::EditorSurface => match &self.surface {
                Some(surface) => self.backend.open_surface_stream(surface, preset.frame_rate),
                None => Err(SlidecastError::source_unavailable(
                    "no editor surface is attached",
                )),
            },
        };

        result.map_err(|e| {
            tracing::warn!(?mode, error = %e, "Capture source could not be opened");
            e.into_capture_start_failed()
        })
    }
}
