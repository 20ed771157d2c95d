//! Scripted capture backend and recording collaborators for controller tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use slidecast_capture_engine::{
    CaptureBackend, CodecSupport, ControllerHandle, EncoderConfig, EncoderEvents, LiveStream,
    MediaEncoder, RecordingController, SessionSnapshot, StreamConstraints, SurfaceHandle,
    TrackKind,
};
use slidecast_common::artifact::ArtifactSink;
use slidecast_common::config::CaptureTiming;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_common::notify::Notifier;
use slidecast_project_model::{Composition, PresentationSettings, Scene};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct FakeState {
    pub supported: Vec<String>,
    pub fail_open: Option<String>,
    pub open_delay: Duration,
    pub auto_complete: bool,
    pub fail_stop_tracks: bool,
    pub fail_request_stop: bool,

    pub streams_opened: usize,
    pub surface_streams: usize,
    pub tracks_stopped: usize,
    pub streams_dropped: usize,
    pub encoders_created: usize,
    pub last_constraints: Option<StreamConstraints>,
    pub last_stream_audio: Option<bool>,
    pub last_mime: Option<String>,

    pub started_at: Vec<Instant>,
    pub stop_requests: Vec<Instant>,
    pub events: Option<EncoderEvents>,
}

/// Backend whose streams and encoders are driven by the test.
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let state = FakeState {
            supported: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm".to_string(),
            ],
            auto_complete: true,
            ..FakeState::default()
        };
        Arc::new(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state lock")
    }

    /// Deliver a chunk from the current encoder.
    pub fn emit(&self, chunk: &[u8]) {
        let events = self.state().events.clone().expect("encoder has started");
        events.data_available(chunk.to_vec());
    }

    /// Report encoder stop completion.
    pub fn finish(&self) {
        let events = self.state().events.clone().expect("encoder has started");
        events.stopped();
    }
}

impl CodecSupport for FakeBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.state().supported.iter().any(|m| m == mime_type)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FakeBackend {
    type Stream = FakeStream;
    type Encoder = FakeEncoder;

    async fn open_display_stream(
        &self,
        constraints: StreamConstraints,
    ) -> SlidecastResult<FakeStream> {
        let delay = self.state().open_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(cause) = state.fail_open.clone() {
            return Err(SlidecastError::source_unavailable(cause));
        }
        state.streams_opened += 1;
        state.last_constraints = Some(constraints);
        state.last_stream_audio = Some(constraints.system_audio);

        let mut tracks = vec![TrackKind::Video];
        if constraints.system_audio {
            tracks.push(TrackKind::Audio);
        }
        Ok(FakeStream {
            tracks,
            stopped: false,
            state: Arc::clone(&self.state),
        })
    }

    fn open_surface_stream(
        &self,
        _surface: &SurfaceHandle,
        _frame_rate: u32,
    ) -> SlidecastResult<FakeStream> {
        let mut state = self.state();
        if let Some(cause) = state.fail_open.clone() {
            return Err(SlidecastError::source_unavailable(cause));
        }
        state.streams_opened += 1;
        state.surface_streams += 1;
        state.last_stream_audio = Some(false);
        Ok(FakeStream {
            tracks: vec![TrackKind::Video],
            stopped: false,
            state: Arc::clone(&self.state),
        })
    }

    fn create_encoder(
        &self,
        _stream: &mut FakeStream,
        config: &EncoderConfig,
        events: EncoderEvents,
    ) -> SlidecastResult<FakeEncoder> {
        if !self.is_type_supported(&config.mime_type) {
            return Err(SlidecastError::encoder_unavailable(format!(
                "{} cannot be encoded",
                config.mime_type
            )));
        }
        let mut state = self.state();
        state.encoders_created += 1;
        state.last_mime = Some(config.mime_type.clone());
        Ok(FakeEncoder {
            events,
            auto_complete: state.auto_complete,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeStream {
    tracks: Vec<TrackKind>,
    stopped: bool,
    state: Arc<Mutex<FakeState>>,
}

impl LiveStream for FakeStream {
    fn tracks(&self) -> Vec<TrackKind> {
        self.tracks.clone()
    }

    fn stop_tracks(&mut self) -> SlidecastResult<()> {
        let mut state = self.state.lock().expect("fake state lock");
        if state.fail_stop_tracks {
            return Err(SlidecastError::source_unavailable("track refused to stop"));
        }
        if !self.stopped {
            self.stopped = true;
            state.tracks_stopped += 1;
        }
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.streams_dropped += 1;
        }
    }
}

pub struct FakeEncoder {
    events: EncoderEvents,
    auto_complete: bool,
    state: Arc<Mutex<FakeState>>,
}

impl MediaEncoder for FakeEncoder {
    fn start(&mut self, _timeslice: Duration) -> SlidecastResult<()> {
        let mut state = self.state.lock().expect("fake state lock");
        state.started_at.push(Instant::now());
        state.events = Some(self.events.clone());
        Ok(())
    }

    fn request_stop(&mut self) -> SlidecastResult<()> {
        let fail = {
            let mut state = self.state.lock().expect("fake state lock");
            state.stop_requests.push(Instant::now());
            state.fail_request_stop
        };
        if fail {
            return Err(SlidecastError::encoder_unavailable("encoder refused to stop"));
        }
        if self.auto_complete {
            self.events.stopped();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().expect("notifier lock").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_success(&self, message: &str) {
        self.successes
            .lock()
            .expect("notifier lock")
            .push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors
            .lock()
            .expect("notifier lock")
            .push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub filename: String,
    pub mime_type: String,
    pub payload: Vec<u8>,
}

/// Sink that keeps artifacts in memory and can be told to refuse.
#[derive(Default)]
pub struct MemorySink {
    saved: Mutex<Vec<SavedArtifact>>,
    refuse: AtomicBool,
}

impl MemorySink {
    pub fn saved(&self) -> Vec<SavedArtifact> {
        self.saved.lock().expect("sink lock").clone()
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl ArtifactSink for MemorySink {
    fn save(&self, filename: &str, mime_type: &str, payload: &[u8]) -> SlidecastResult<PathBuf> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SlidecastError::save("download was blocked"));
        }
        self.saved.lock().expect("sink lock").push(SavedArtifact {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            payload: payload.to_vec(),
        });
        Ok(PathBuf::from(filename))
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<MemorySink>,
    pub handle: ControllerHandle,
    pub snapshots: watch::Receiver<SessionSnapshot>,
}

impl Harness {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = Arc::new(MemorySink::default());
        let (handle, _task) = RecordingController::spawn(
            Arc::clone(&backend),
            notifier.clone(),
            sink.clone(),
            CaptureTiming::default(),
        );
        let snapshots = handle.subscribe();
        Self {
            backend,
            notifier,
            sink,
            handle,
            snapshots,
        }
    }

    /// Wait until the published snapshot satisfies `pred`.
    pub async fn wait_for(&mut self, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        tokio::time::timeout(Duration::from_secs(3600), self.snapshots.wait_for(|s| pred(s)))
            .await
            .expect("controller never reached the expected state")
            .expect("controller shut down")
            .clone()
    }
}

/// Two scenes, 4s + 6s.
pub fn ten_second_deck() -> Composition {
    Composition::new(
        vec![
            Scene::new(0, "Intro", "Welcome").with_duration(4.0),
            Scene::new(1, "Outro", "Thanks").with_duration(6.0),
        ],
        PresentationSettings::default(),
    )
}
