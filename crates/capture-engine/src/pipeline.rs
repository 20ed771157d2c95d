//! GStreamer pipeline construction for chunked capture.
//!
//! A capture pipeline is one launch string:
//!
//! ```text
//! source ! queue ! videoconvert ! videorate ! videoscale ! caps ! encoder ! mux.
//! [audio source ! audioconvert ! audioresample ! encoder ! mux.]
//! muxer name=mux ! appsink
//! ```
//!
//! Encoded buffers leave through the appsink and are batched into chunks on
//! a fixed timeslice before being handed to [`EncoderEvents`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use slidecast_common::clock::RateController;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::backend::EncoderEvents;
use crate::negotiator::parse_mime;

/// Launch fragments for the sources of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescription {
    pub video: String,
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Muxer {
    Webm,
    Mp4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Opus,
    Aac,
}

/// Elements needed to produce one MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPlan {
    pub muxer: Muxer,
    pub video: VideoCodec,
    pub audio: AudioCodec,

    /// The MIME type named the audio codec, so it must be available.
    pub audio_explicit: bool,
}

impl EncodingPlan {
    /// Map a MIME type such as `video/webm;codecs=vp9,opus` to a plan.
    ///
    /// Returns `None` for unknown containers, unknown codecs, or codecs the
    /// container cannot carry.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let spec = parse_mime(mime_type);
        let muxer = match spec.container.as_str() {
            "video/webm" => Muxer::Webm,
            "video/mp4" => Muxer::Mp4,
            _ => return None,
        };

        let mut video = None;
        let mut audio = None;
        for codec in &spec.codecs {
            let codec = codec.to_ascii_lowercase();
            match (muxer, codec.as_str()) {
                (Muxer::Webm, "vp8") => video = Some(VideoCodec::Vp8),
                (Muxer::Webm, c) if c == "vp9" || c.starts_with("vp09") => {
                    video = Some(VideoCodec::Vp9)
                }
                (Muxer::Webm, "opus") => audio = Some(AudioCodec::Opus),
                (Muxer::Mp4, c) if c == "h264" || c.starts_with("avc1") => {
                    video = Some(VideoCodec::H264)
                }
                (Muxer::Mp4, c) if c == "aac" || c.starts_with("mp4a") => {
                    audio = Some(AudioCodec::Aac)
                }
                _ => return None,
            }
        }

        let (default_video, default_audio) = match muxer {
            Muxer::Webm => (VideoCodec::Vp8, AudioCodec::Opus),
            Muxer::Mp4 => (VideoCodec::H264, AudioCodec::Aac),
        };
        Some(Self {
            muxer,
            video: video.unwrap_or(default_video),
            audio: audio.unwrap_or(default_audio),
            audio_explicit: audio.is_some(),
        })
    }

    /// Element factories that must exist for this plan.
    pub fn required_elements(&self) -> Vec<&'static str> {
        let mut elements = vec![
            "appsink",
            "queue",
            "videoconvert",
            "videorate",
            "videoscale",
            self.muxer_element(),
        ];
        elements.extend(self.video_elements());
        if self.audio_explicit {
            elements.extend(self.audio_elements());
        }
        elements
    }

    /// Element factories for the audio branch.
    pub fn audio_elements(&self) -> Vec<&'static str> {
        let mut elements = vec!["audioconvert", "audioresample"];
        match self.audio {
            AudioCodec::Opus => elements.push("opusenc"),
            AudioCodec::Aac => elements.extend(["avenc_aac", "aacparse"]),
        }
        elements
    }

    fn video_elements(&self) -> Vec<&'static str> {
        match self.video {
            VideoCodec::Vp8 => vec!["vp8enc"],
            VideoCodec::Vp9 => vec!["vp9enc"],
            VideoCodec::H264 => vec!["x264enc", "h264parse"],
        }
    }

    fn muxer_element(&self) -> &'static str {
        match self.muxer {
            Muxer::Webm => "webmmux",
            Muxer::Mp4 => "mp4mux",
        }
    }

    fn muxer_fragment(&self) -> &'static str {
        match self.muxer {
            Muxer::Webm => "webmmux streamable=true",
            // Fragmented output so every chunk is appendable.
            Muxer::Mp4 => "mp4mux fragment-duration=1000 streamable=true",
        }
    }

    fn video_encoder_fragment(&self, bits_per_second: u64, fps: u32) -> String {
        // One keyframe every 2 seconds.
        let keyint = fps.saturating_mul(2).max(2);
        match self.video {
            VideoCodec::Vp8 | VideoCodec::Vp9 => {
                let element = if self.video == VideoCodec::Vp8 {
                    "vp8enc"
                } else {
                    "vp9enc"
                };
                format!(
                    "{element} deadline=1 cpu-used=8 target-bitrate={bits_per_second} keyframe-max-dist={keyint}"
                )
            }
            VideoCodec::H264 => {
                let kbps = (bits_per_second / 1000).max(1);
                format!(
                    "x264enc tune=zerolatency speed-preset=veryfast bitrate={kbps} key-int-max={keyint} ! h264parse"
                )
            }
        }
    }

    fn audio_encoder_fragment(&self) -> &'static str {
        match self.audio {
            AudioCodec::Opus => "opusenc bitrate=128000",
            AudioCodec::Aac => "avenc_aac bitrate=192000 ! aacparse",
        }
    }

    /// Full launch string for `source` encoded with this plan.
    ///
    /// `size` is a best-effort scaling target; `None` keeps the source size.
    pub fn launch_description(
        &self,
        source: &SourceDescription,
        bits_per_second: u64,
        fps: u32,
        size: Option<(u32, u32)>,
    ) -> String {
        let fps = fps.max(1);
        let dims = match size {
            Some((w, h)) if w > 0 && h > 0 => format!(",width={w},height={h}"),
            _ => String::new(),
        };

        let mut launch = format!(
            "{mux} name=mux ! appsink name=chunk_sink emit-signals=true sync=false \
             {video} name=video_src ! queue max-size-buffers=200 leaky=downstream ! videoconvert ! videorate ! videoscale ! video/x-raw,framerate={fps}/1{dims} ! queue max-size-buffers=8 ! {venc} ! queue ! mux.",
            mux = self.muxer_fragment(),
            video = source.video,
            venc = self.video_encoder_fragment(bits_per_second, fps),
        );

        if let Some(audio) = &source.audio {
            launch.push_str(&format!(
                " {audio} name=audio_src ! queue ! audioconvert ! audioresample ! {aenc} ! queue ! mux.",
                aenc = self.audio_encoder_fragment(),
            ));
        }
        launch
    }
}

/// Groups encoded buffers into chunks, at most one per interval.
#[derive(Debug)]
pub struct ChunkBatcher {
    pending: Vec<u8>,
    rate: RateController,
    started: std::time::Instant,
}

impl ChunkBatcher {
    pub fn new(timeslice: Duration) -> Self {
        Self {
            pending: Vec::new(),
            rate: RateController::with_interval(timeslice),
            started: std::time::Instant::now(),
        }
    }

    /// Add a buffer; returns a chunk when the timeslice has elapsed.
    pub fn push(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let now_ns = self.started.elapsed().as_nanos() as u64;
        self.push_at(data, now_ns)
    }

    fn push_at(&mut self, data: &[u8], now_ns: u64) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(data);
        if !self.pending.is_empty() && self.rate.should_tick(now_ns) {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    /// Whatever is left, if anything.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
    }
}

/// A launched pipeline whose appsink feeds [`EncoderEvents`].
pub struct ChunkPipeline {
    name: String,
    pipeline: gst::Pipeline,
    sink: gst::Element,
    events: EncoderEvents,
    batcher: Arc<Mutex<ChunkBatcher>>,
    stop_requested: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl ChunkPipeline {
    pub fn from_launch(
        name: impl Into<String>,
        launch: &str,
        events: EncoderEvents,
    ) -> SlidecastResult<Self> {
        init_gstreamer()?;
        let name = name.into();

        let element = gst::parse::launch(launch).map_err(|e| {
            SlidecastError::encoder_unavailable(format!("Failed to build {name} pipeline: {e}"))
        })?;
        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            SlidecastError::encoder_unavailable("Launch string did not produce a pipeline")
        })?;
        let sink = pipeline.by_name("chunk_sink").ok_or_else(|| {
            SlidecastError::encoder_unavailable("Pipeline has no chunk_sink element")
        })?;

        tracing::debug!(pipeline = %name, launch, "Capture pipeline built");
        Ok(Self {
            name,
            pipeline,
            sink,
            events,
            batcher: Arc::new(Mutex::new(ChunkBatcher::new(Duration::from_millis(100)))),
            stop_requested: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle to the underlying pipeline, for the stream side.
    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    pub fn start(&mut self, timeslice: Duration) -> SlidecastResult<()> {
        if let Ok(mut batcher) = self.batcher.lock() {
            *batcher = ChunkBatcher::new(timeslice);
        }

        let batcher = Arc::clone(&self.batcher);
        let events = self.events.clone();
        self.sink.connect("new-sample", false, move |args| {
            let sample = args
                .first()
                .and_then(|v| v.get::<gst::Element>().ok())
                .and_then(|sink| sink.emit_by_name::<Option<gst::Sample>>("pull-sample", &[]));
            if let Some(sample) = sample {
                if let Some(map) = sample.buffer().and_then(|b| b.map_readable().ok()) {
                    let chunk = batcher.lock().ok().and_then(|mut b| b.push(map.as_slice()));
                    if let Some(chunk) = chunk {
                        events.data_available(chunk);
                    }
                }
            }
            Some(gst::FlowReturn::Ok.to_value())
        });

        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            SlidecastError::capture_start(format!("Failed to start {} pipeline: {e:?}", self.name))
        })?;

        // State changes are async; wait until the source is actually open.
        match self.pipeline.state(gst::ClockTime::from_seconds(10)) {
            (Ok(_), gst::State::Playing, _) => {}
            (Ok(_), state, _) => {
                tracing::warn!(
                    pipeline = %self.name,
                    ?state,
                    "Pipeline did not reach Playing state within timeout"
                );
            }
            (Err(e), _, _) => {
                let _ = self.pipeline.set_state(gst::State::Null);
                return Err(SlidecastError::capture_start(format!(
                    "{} pipeline failed to reach Playing state: {e:?}",
                    self.name
                )));
            }
        }

        tracing::info!(pipeline = %self.name, ?timeslice, "Capture pipeline playing");
        Ok(())
    }

    /// Send EOS and drain on a helper thread. `stopped()` is emitted exactly
    /// once, after the tail chunk, when the drain finishes or times out.
    pub fn request_stop(&mut self, drain_timeout: Duration) -> SlidecastResult<()> {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.pipeline.send_event(gst::event::Eos::new()) {
            tracing::warn!(pipeline = %self.name, "Failed to send EOS event; output may be truncated");
        }

        let name = self.name.clone();
        let pipeline = self.pipeline.clone();
        let batcher = Arc::clone(&self.batcher);
        let events = self.events.clone();
        let stopped = Arc::clone(&self.stopped);

        std::thread::Builder::new()
            .name(format!("{name}-drain"))
            .spawn(move || {
                drain_bus(&pipeline, &name, drain_timeout);

                let tail = batcher.lock().ok().and_then(|mut b| b.flush());
                if let Some(tail) = tail {
                    events.data_available(tail);
                }
                if let Err(e) = pipeline.set_state(gst::State::Null) {
                    tracing::warn!(pipeline = %name, error = ?e, "Failed to reset pipeline");
                }
                if !stopped.swap(true, Ordering::SeqCst) {
                    events.stopped();
                }
            })
            .map_err(|e| {
                SlidecastError::encoder_unavailable(format!("Cannot spawn drain thread: {e}"))
            })?;
        Ok(())
    }
}

impl Drop for ChunkPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(pipeline = %self.name, error = ?e, "Failed to release pipeline");
        }
    }
}

/// Wait for EOS (or an error) to reach the bus, bounded by `deadline`.
fn drain_bus(pipeline: &gst::Pipeline, name: &str, deadline: Duration) {
    let Some(bus) = pipeline.bus() else {
        return;
    };
    let start = std::time::Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            tracing::warn!(pipeline = %name, ?deadline, "EOS drain timed out");
            return;
        }
        let remaining = gst::ClockTime::from_nseconds((deadline - elapsed).as_nanos() as u64);
        match bus.timed_pop(remaining) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::debug!(pipeline = %name, "EOS received; pipeline drained");
                    return;
                }
                gst::MessageView::Error(e) => {
                    tracing::warn!(
                        pipeline = %name,
                        error = %e.error(),
                        "Pipeline error during EOS drain"
                    );
                    return;
                }
                _ => {}
            },
            None => {
                tracing::warn!(pipeline = %name, ?deadline, "EOS drain timed out");
                return;
            }
        }
    }
}

/// Whether an element factory is installed.
pub fn element_available(name: &str) -> bool {
    init_gstreamer().is_ok() && gst::ElementFactory::find(name).is_some()
}

pub fn init_gstreamer() -> SlidecastResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => Err(SlidecastError::encoder_unavailable(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}
