//! Platform capture contracts.
//!
//! A [`CaptureBackend`] opens live streams (whole display or the editor's
//! surface), reports which container/codec combinations it can encode, and
//! binds an encoder to a stream. Encoders deliver their output through
//! [`EncoderEvents`], which may be called from any thread.

use std::time::Duration;

use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::QualityPreset;
use tokio::sync::mpsc;

use crate::negotiator::EncoderConfig;

pub mod gst_backend;
pub mod linux;
pub mod macos;
pub mod windows;

pub use self::gst_backend::{GstBackend, GstEncoder, GstLiveStream};

/// Identifies one recording session inside a controller.
pub type SessionId = u64;

/// A live reference to the editor's rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceHandle {
    /// Platform identifier of the drawable (X11 window id, HWND, ...).
    pub id: String,

    pub width: u32,
    pub height: u32,
}

/// Best-effort hints for a display capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,

    /// Attach system audio when the platform offers it.
    pub system_audio: bool,
}

impl StreamConstraints {
    pub fn from_preset(preset: &QualityPreset, system_audio: bool) -> Self {
        Self {
            frame_rate: preset.frame_rate,
            width: preset.width,
            height: preset.height,
            system_audio,
        }
    }
}

/// Kind of media carried by a stream track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Answers whether a MIME type (with optional `codecs=` parameter) can be
/// encoded on this platform.
pub trait CodecSupport {
    fn is_type_supported(&self, mime_type: &str) -> bool;
}

/// A live capture stream.
pub trait LiveStream: Send + 'static {
    fn tracks(&self) -> Vec<TrackKind>;

    fn has_audio(&self) -> bool {
        self.tracks().contains(&TrackKind::Audio)
    }

    /// Stop every track. Must be safe to call more than once.
    fn stop_tracks(&mut self) -> SlidecastResult<()>;
}

/// An encoder bound to a live stream.
pub trait MediaEncoder: Send + 'static {
    /// Begin encoding, emitting a chunk roughly every `timeslice`.
    fn start(&mut self, timeslice: Duration) -> SlidecastResult<()>;

    /// Ask the encoder to drain. Completion is reported through
    /// [`EncoderEvents::stopped`], not by this call returning.
    fn request_stop(&mut self) -> SlidecastResult<()>;
}

/// Platform-specific capture capabilities.
#[async_trait::async_trait]
pub trait CaptureBackend: CodecSupport + Send + Sync + 'static {
    type Stream: LiveStream;
    type Encoder: MediaEncoder;

    /// Open a capture of the whole display. May wait on a permission grant.
    async fn open_display_stream(&self, constraints: StreamConstraints)
        -> SlidecastResult<Self::Stream>;

    /// Derive a video-only stream from a rendering surface.
    fn open_surface_stream(
        &self,
        surface: &SurfaceHandle,
        frame_rate: u32,
    ) -> SlidecastResult<Self::Stream>;

    /// Create an encoder for `stream` with the negotiated configuration.
    fn create_encoder(
        &self,
        stream: &mut Self::Stream,
        config: &EncoderConfig,
        events: EncoderEvents,
    ) -> SlidecastResult<Self::Encoder>;
}

/// Output of an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    DataAvailable(Vec<u8>),
    Stopped,
}

/// Sender handed to an encoder; every event is tagged with its session.
#[derive(Debug, Clone)]
pub struct EncoderEvents {
    session: SessionId,
    sender: mpsc::UnboundedSender<(SessionId, EncoderEvent)>,
}

impl EncoderEvents {
    pub(crate) fn new(
        session: SessionId,
        sender: mpsc::UnboundedSender<(SessionId, EncoderEvent)>,
    ) -> Self {
        Self { session, sender }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn data_available(&self, chunk: Vec<u8>) {
        // A closed channel means the controller is gone; nothing to deliver to.
        let _ = self
            .sender
            .send((self.session, EncoderEvent::DataAvailable(chunk)));
    }

    pub fn stopped(&self) {
        let _ = self.sender.send((self.session, EncoderEvent::Stopped));
    }
}

/// Windowing environment the capture runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePlatform {
    X11,
    Wayland,
    Windows,
    MacOS,
    Unknown,
}

/// Detect the windowing environment.
pub fn detect_platform() -> CapturePlatform {
    if cfg!(target_os = "windows") {
        return CapturePlatform::Windows;
    }
    if cfg!(target_os = "macos") {
        return CapturePlatform::MacOS;
    }

    let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some()
        || std::env::var("XDG_SESSION_TYPE")
            .map(|v| v == "wayland")
            .unwrap_or(false);
    if wayland {
        CapturePlatform::Wayland
    } else if std::env::var_os("DISPLAY").is_some() {
        CapturePlatform::X11
    } else {
        CapturePlatform::Unknown
    }
}

/// Parse a native window id given in decimal or `0x` hexadecimal.
pub(crate) fn parse_surface_id(id: &str) -> SlidecastResult<u64> {
    let id = id.trim();
    let parsed = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => id.parse::<u64>(),
    };
    parsed.map_err(|_| {
        SlidecastError::source_unavailable(format!(
            "Surface id {id:?} is not a native window id"
        ))
    })
}
