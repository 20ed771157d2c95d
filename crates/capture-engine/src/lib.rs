//! Slidecast Capture Engine
//!
//! Records a live rendering of a composition into a single video file.
//! A session counts down, opens a capture stream, encodes it into chunks
//! for exactly the composition's total duration, then concatenates the
//! chunks and hands the file to an artifact sink.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 RecordingController                  │
//! │  commands ──┐                                        │
//! │  timers ────┼──► one task, one RecordingSession      │
//! │  encoder ───┘        │            │                  │
//! │                      ▼            ▼                  │
//! │  ┌────────────────────────┐ ┌─────────────────────┐  │
//! │  │ CaptureSourceSelector  │ │ Negotiator          │  │
//! │  │  display | surface     │ │  mime + bitrate     │  │
//! │  └───────────┬────────────┘ └──────────┬──────────┘  │
//! │              ▼                         ▼             │
//! │  ┌─────────────────────────────────────────────────┐ │
//! │  │ CaptureBackend (GStreamer)                      │ │
//! │  │  source ! encoder ! muxer ! appsink ──► chunks  │ │
//! │  └─────────────────────────────────────────────────┘ │
//! │                      │                               │
//! │                      ▼                               │
//! │        Finalizer ──► ArtifactSink (download dir)     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod finalizer;
pub mod negotiator;
pub mod pipeline;
pub mod session;
pub mod source;

pub use backend::{
    CaptureBackend, CodecSupport, EncoderEvent, EncoderEvents, GstBackend, LiveStream,
    MediaEncoder, StreamConstraints, SurfaceHandle, TrackKind,
};
pub use finalizer::{FinalizeOutcome, FinalizedVideo};
pub use negotiator::{EncoderConfig, NegotiationOutcome};
pub use session::*;
pub use source::CaptureSourceSelector;
