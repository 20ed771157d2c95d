//! [`CaptureBackend`] on top of GStreamer.

use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use slidecast_common::config::CaptureTiming;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::backend::{
    detect_platform, linux, macos, windows, CaptureBackend, CapturePlatform, CodecSupport,
    EncoderEvents, LiveStream, MediaEncoder, StreamConstraints, SurfaceHandle, TrackKind,
};
use crate::negotiator::EncoderConfig;
use crate::pipeline::{element_available, init_gstreamer, ChunkPipeline, EncodingPlan, SourceDescription};

pub struct GstBackend {
    platform: CapturePlatform,

    /// Upper bound on the EOS drain when an encoder stops. Same value the
    /// controller waits for before finalizing without a stop signal.
    drain_timeout: Duration,
}

impl GstBackend {
    pub fn new(timing: &CaptureTiming) -> SlidecastResult<Self> {
        init_gstreamer()?;
        let backend = Self::for_platform(detect_platform(), timing);
        tracing::info!(platform = ?backend.platform, "GStreamer capture backend ready");
        Ok(backend)
    }

    fn for_platform(platform: CapturePlatform, timing: &CaptureTiming) -> Self {
        Self {
            platform,
            drain_timeout: timing.drain_timeout(),
        }
    }

    pub fn platform(&self) -> CapturePlatform {
        self.platform
    }
}

impl CodecSupport for GstBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        EncodingPlan::from_mime(mime_type)
            .map(|plan| plan.required_elements().into_iter().all(element_available))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for GstBackend {
    type Stream = GstLiveStream;
    type Encoder = GstEncoder;

    async fn open_display_stream(
        &self,
        constraints: StreamConstraints,
    ) -> SlidecastResult<GstLiveStream> {
        let source = match self.platform {
            CapturePlatform::Windows => {
                windows::display_source(self.platform, &constraints, &element_available)?
            }
            CapturePlatform::MacOS => {
                macos::display_source(self.platform, &constraints, &element_available)?
            }
            _ => linux::display_source(self.platform, &constraints, &element_available)?,
        };
        Ok(GstLiveStream::new(
            source,
            Some((constraints.width, constraints.height)),
        ))
    }

    fn open_surface_stream(
        &self,
        surface: &SurfaceHandle,
        frame_rate: u32,
    ) -> SlidecastResult<GstLiveStream> {
        let source = match self.platform {
            CapturePlatform::Windows => {
                windows::surface_source(self.platform, surface, &element_available)?
            }
            CapturePlatform::MacOS => {
                macos::surface_source(self.platform, surface, &element_available)?
            }
            _ => linux::surface_source(self.platform, surface, &element_available)?,
        };
        tracing::debug!(surface = %surface.id, frame_rate, "Surface stream opened");
        Ok(GstLiveStream::new(source, Some((surface.width, surface.height))))
    }

    fn create_encoder(
        &self,
        stream: &mut GstLiveStream,
        config: &EncoderConfig,
        events: EncoderEvents,
    ) -> SlidecastResult<GstEncoder> {
        let plan = EncodingPlan::from_mime(&config.mime_type).ok_or_else(|| {
            SlidecastError::encoder_unavailable(format!(
                "No encoding plan for {}",
                config.mime_type
            ))
        })?;
        if let Some(missing) = plan
            .required_elements()
            .into_iter()
            .find(|e| !element_available(e))
        {
            return Err(SlidecastError::encoder_unavailable(format!(
                "GStreamer element '{missing}' is not installed"
            )));
        }

        let mut source = stream.source.clone();
        if source.audio.is_some() && !plan.audio_elements().into_iter().all(element_available) {
            tracing::warn!(mime_type = %config.mime_type, "No audio encoder available; dropping audio");
            source.audio = None;
        }

        let launch = plan.launch_description(
            &source,
            config.video_bits_per_second,
            config.frame_rate,
            stream.size,
        );
        let pipeline = ChunkPipeline::from_launch(
            format!("capture-{}", events.session()),
            &launch,
            events,
        )?;
        stream.bind(pipeline.pipeline().clone(), source.audio.is_some());

        Ok(GstEncoder {
            pipeline,
            drain_timeout: self.drain_timeout,
        })
    }
}

/// A capture source, bound to a running pipeline once an encoder exists.
pub struct GstLiveStream {
    source: SourceDescription,
    size: Option<(u32, u32)>,
    tracks: Vec<TrackKind>,
    pipeline: Option<gst::Pipeline>,
    stopped: bool,
}

impl GstLiveStream {
    fn new(source: SourceDescription, size: Option<(u32, u32)>) -> Self {
        let mut tracks = vec![TrackKind::Video];
        if source.audio.is_some() {
            tracks.push(TrackKind::Audio);
        }
        Self {
            source,
            size,
            tracks,
            pipeline: None,
            stopped: false,
        }
    }

    fn bind(&mut self, pipeline: gst::Pipeline, has_audio: bool) {
        if !has_audio {
            self.tracks.retain(|t| *t != TrackKind::Audio);
        }
        self.pipeline = Some(pipeline);
    }

    pub fn source(&self) -> &SourceDescription {
        &self.source
    }
}

impl LiveStream for GstLiveStream {
    fn tracks(&self) -> Vec<TrackKind> {
        self.tracks.clone()
    }

    fn stop_tracks(&mut self) -> SlidecastResult<()> {
        if std::mem::replace(&mut self.stopped, true) {
            return Ok(());
        }
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };

        let mut unstopped = Vec::new();
        for name in ["video_src", "audio_src"] {
            if let Some(element) = pipeline.by_name(name) {
                if !element.send_event(gst::event::Eos::new()) {
                    unstopped.push(name);
                }
            }
        }
        if unstopped.is_empty() {
            Ok(())
        } else {
            Err(SlidecastError::Other(anyhow::anyhow!(
                "EOS not accepted by {}",
                unstopped.join(", ")
            )))
        }
    }
}

impl Drop for GstLiveStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop_tracks() {
            tracing::warn!(error = %e, "Failed to stop capture tracks");
        }
    }
}

pub struct GstEncoder {
    pipeline: ChunkPipeline,
    drain_timeout: Duration,
}

impl MediaEncoder for GstEncoder {
    fn start(&mut self, timeslice: Duration) -> SlidecastResult<()> {
        self.pipeline.start(timeslice)
    }

    fn request_stop(&mut self) -> SlidecastResult<()> {
        self.pipeline.request_stop(self.drain_timeout)
    }
}
