//! Recording session controller.
//!
//! One [`RecordingController`] owns at most one [`RecordingSession`] and runs
//! as a single tokio task. Every input (user commands, timers, stream
//! acquisition, encoder output) arrives as a message and is handled to
//! completion before the next, so session state needs no locking.
//!
//! Timers and the acquisition future are spawned tasks whose handles live in
//! the session record. Dropping the session aborts them; their messages are
//! tagged with the session id, so anything already in flight for an older
//! session is ignored.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use slidecast_common::artifact::ArtifactSink;
use slidecast_common::clock::{capped_progress, RecordingClock};
use slidecast_common::config::CaptureTiming;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_common::notify::Notifier;
use slidecast_project_model::{Composition, CompositionSource, ExportSettings, QualityPreset};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::{
    CaptureBackend, EncoderEvent, EncoderEvents, LiveStream, MediaEncoder, SessionId,
    SurfaceHandle,
};
use crate::finalizer::{finalize, output_filename, FinalizeOutcome, FinalizedVideo};
use crate::negotiator::{self, EncoderConfig};
use crate::source::CaptureSourceSelector;

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Countdown,
    Recording,
    Processing,
    Done,
}

impl SessionStatus {
    /// A session exists and a new start request would be ignored.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Countdown | Self::Recording | Self::Processing)
    }
}

/// Observable state, published on every change.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,

    /// Countdown ticks left; 0 outside the countdown.
    pub countdown: u32,

    pub elapsed_secs: f64,

    /// 0 to 99 while recording, 100 only once the file is finalized.
    pub progress: f64,

    /// Non-empty chunks accumulated so far.
    pub chunks: usize,
    pub bytes: usize,

    /// A finalized video is waiting for [`ControllerHandle::retry_save`].
    pub pending_save: bool,
}

#[derive(Debug)]
enum Command {
    Start {
        settings: ExportSettings,
        composition: Composition,
    },
    Stop,
    Cancel,
    AttachSurface(Option<SurfaceHandle>),
    RetrySave,
}

enum SessionEvent<S> {
    CountdownTick,
    StreamOpened(SlidecastResult<S>),
    ProgressTick,
    Deadline,
    DrainTimeout,
}

type EventSender<S> = mpsc::UnboundedSender<(SessionId, SessionEvent<S>)>;

/// Aborts the task when dropped.
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_after<S: Send + 'static>(
    tx: &EventSender<S>,
    session: SessionId,
    delay: Duration,
    event: SessionEvent<S>,
) -> TaskGuard {
    let tx = tx.clone();
    TaskGuard(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send((session, event));
    }))
}

fn spawn_every<S: Send + 'static>(
    tx: &EventSender<S>,
    session: SessionId,
    period: Duration,
    make: fn() -> SessionEvent<S>,
) -> TaskGuard {
    let tx = tx.clone();
    TaskGuard(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.send((session, make())).is_err() {
                break;
            }
        }
    }))
}

/// Everything owned by one recording attempt.
struct RecordingSession<B: CaptureBackend> {
    id: SessionId,
    settings: ExportSettings,
    preset: &'static QualityPreset,

    /// Frozen total duration of the composition.
    total: Duration,

    countdown_remaining: u32,
    countdown_timer: Option<TaskGuard>,
    acquisition: Option<TaskGuard>,

    stream: Option<B::Stream>,
    encoder: Option<B::Encoder>,
    encoder_config: Option<EncoderConfig>,
    clock: Option<RecordingClock>,

    progress_timer: Option<TaskGuard>,
    deadline_timer: Option<TaskGuard>,
    drain_timer: Option<TaskGuard>,

    chunks: Vec<Vec<u8>>,
    bytes: usize,

    /// Ended by cancel: salvage the file but do not announce success.
    cancelled: bool,
}

impl<B: CaptureBackend> RecordingSession<B> {
    fn new(id: SessionId, settings: ExportSettings, total: Duration, countdown: u32) -> Self {
        let preset = settings.preset();
        Self {
            id,
            settings,
            preset,
            total,
            countdown_remaining: countdown,
            countdown_timer: None,
            acquisition: None,
            stream: None,
            encoder: None,
            encoder_config: None,
            clock: None,
            progress_timer: None,
            deadline_timer: None,
            drain_timer: None,
            chunks: Vec::new(),
            bytes: 0,
            cancelled: false,
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock
            .as_ref()
            .map(RecordingClock::elapsed)
            .unwrap_or_default()
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop_tracks() {
                tracing::warn!(session = self.id, error = %e, "Failed to stop capture tracks");
            }
        }
    }
}

impl<B: CaptureBackend> Drop for RecordingSession<B> {
    fn drop(&mut self) {
        self.countdown_timer = None;
        self.acquisition = None;
        self.progress_timer = None;
        self.deadline_timer = None;
        self.drain_timer = None;
        self.release_stream();
        self.encoder = None;
        tracing::debug!(session = self.id, "Session resources released");
    }
}

/// Cloneable handle for driving a [`RecordingController`].
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl ControllerHandle {
    fn send(&self, command: Command) -> SlidecastResult<()> {
        self.commands.send(command).map_err(|_| {
            SlidecastError::Other(anyhow::anyhow!("recording controller has shut down"))
        })
    }

    /// Request a new session. Ignored while one is active.
    pub fn start(&self, settings: ExportSettings, composition: Composition) -> SlidecastResult<()> {
        self.send(Command::Start {
            settings,
            composition,
        })
    }

    /// Start with a snapshot taken from `source` now.
    pub fn start_from(
        &self,
        settings: ExportSettings,
        source: &impl CompositionSource,
    ) -> SlidecastResult<()> {
        self.start(settings, source.snapshot())
    }

    pub fn stop(&self) -> SlidecastResult<()> {
        self.send(Command::Stop)
    }

    pub fn cancel(&self) -> SlidecastResult<()> {
        self.send(Command::Cancel)
    }

    pub fn attach_surface(&self, surface: Option<SurfaceHandle>) -> SlidecastResult<()> {
        self.send(Command::AttachSurface(surface))
    }

    pub fn retry_save(&self) -> SlidecastResult<()> {
        self.send(Command::RetrySave)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }
}

pub struct RecordingController<B: CaptureBackend> {
    backend: Arc<B>,
    selector: CaptureSourceSelector<B>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn ArtifactSink>,
    timing: CaptureTiming,

    commands: mpsc::UnboundedReceiver<Command>,
    session_tx: EventSender<B::Stream>,
    session_rx: mpsc::UnboundedReceiver<(SessionId, SessionEvent<B::Stream>)>,
    encoder_tx: mpsc::UnboundedSender<(SessionId, EncoderEvent)>,
    encoder_rx: mpsc::UnboundedReceiver<(SessionId, EncoderEvent)>,
    published: watch::Sender<SessionSnapshot>,

    state: SessionSnapshot,
    session: Option<RecordingSession<B>>,
    next_id: SessionId,
    pending_save: Option<FinalizedVideo>,
}

impl<B: CaptureBackend> RecordingController<B> {
    pub fn new(
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn ArtifactSink>,
        timing: CaptureTiming,
    ) -> (Self, ControllerHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (encoder_tx, encoder_rx) = mpsc::unbounded_channel();
        let (published, snapshot) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            selector: CaptureSourceSelector::new(Arc::clone(&backend)),
            backend,
            notifier,
            sink,
            timing,
            commands,
            session_tx,
            session_rx,
            encoder_tx,
            encoder_rx,
            published,
            state: SessionSnapshot::default(),
            session: None,
            next_id: 1,
            pending_save: None,
        };
        let handle = ControllerHandle {
            commands: command_tx,
            snapshot,
        };
        (controller, handle)
    }

    /// Build a controller and run it on the current tokio runtime.
    pub fn spawn(
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn ArtifactSink>,
        timing: CaptureTiming,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(backend, notifier, sink, timing);
        (handle, tokio::spawn(controller.run()))
    }

    /// Process messages until every [`ControllerHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some((id, event)) = self.encoder_rx.recv() => self.on_encoder_event(id, event),
                Some((id, event)) = self.session_rx.recv() => self.on_session_event(id, event),
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
            }
        }

        if self.session.take().is_some() {
            tracing::info!("Controller shut down with an active session; resources released");
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }

    fn set_status(&mut self, status: SessionStatus) {
        let session = self.session.as_ref().map(|s| s.id);
        tracing::info!(?session, from = ?self.state.status, to = ?status, "Session status changed");
        self.state.status = status;
        self.state.pending_save = self.pending_save.is_some();
        self.publish();
    }

    /// The live session, if `id` names it.
    fn current(&mut self, id: SessionId) -> Option<&mut RecordingSession<B>> {
        self.session.as_mut().filter(|s| s.id == id)
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start {
                settings,
                composition,
            } => self.start(settings, composition),
            Command::Stop => {
                if self.state.status == SessionStatus::Recording {
                    self.begin_stop(false);
                } else {
                    tracing::debug!(status = ?self.state.status, "Stop ignored");
                }
            }
            Command::Cancel => self.cancel(),
            Command::AttachSurface(surface) => {
                tracing::debug!(attached = surface.is_some(), "Editor surface updated");
                self.selector.set_surface(surface);
            }
            Command::RetrySave => self.retry_save(),
        }
    }

    fn on_session_event(&mut self, id: SessionId, event: SessionEvent<B::Stream>) {
        match event {
            SessionEvent::CountdownTick => self.countdown_tick(id),
            SessionEvent::StreamOpened(result) => self.stream_opened(id, result),
            SessionEvent::ProgressTick => {
                if self.state.status == SessionStatus::Recording {
                    if let Some(session) = self.session.as_ref().filter(|s| s.id == id) {
                        let elapsed = session.elapsed();
                        let progress = capped_progress(elapsed, session.total);
                        self.state.elapsed_secs = elapsed.as_secs_f64();
                        self.state.progress = self.state.progress.max(progress);
                        self.publish();
                    }
                }
            }
            SessionEvent::Deadline => {
                if self.state.status == SessionStatus::Recording && self.current(id).is_some() {
                    tracing::info!(session = id, "Deadline reached; stopping");
                    self.begin_stop(false);
                }
            }
            SessionEvent::DrainTimeout => {
                if self.state.status == SessionStatus::Processing && self.current(id).is_some() {
                    tracing::warn!(session = id, "Encoder did not report stop in time; finalizing");
                    self.complete();
                }
            }
        }
    }

    fn on_encoder_event(&mut self, id: SessionId, event: EncoderEvent) {
        let status = self.state.status;
        let Some(session) = self.session.as_mut().filter(|s| s.id == id) else {
            tracing::debug!(session = id, "Dropping encoder event for a finished session");
            return;
        };

        match event {
            EncoderEvent::DataAvailable(chunk) => {
                let accepting = matches!(status, SessionStatus::Recording | SessionStatus::Processing);
                if chunk.is_empty() || !accepting {
                    return;
                }
                session.bytes += chunk.len();
                session.chunks.push(chunk);
                self.state.chunks = session.chunks.len();
                self.state.bytes = session.bytes;
                self.publish();
            }
            EncoderEvent::Stopped => match status {
                SessionStatus::Processing => self.complete(),
                SessionStatus::Recording => {
                    tracing::info!(session = id, "Encoder stopped on its own; finalizing");
                    self.begin_stop(false);
                    if self.state.status == SessionStatus::Processing {
                        self.complete();
                    }
                }
                _ => {}
            },
        }
    }

    fn start(&mut self, settings: ExportSettings, composition: Composition) {
        if self.state.status.is_active() {
            tracing::debug!(status = ?self.state.status, "Start ignored; a session is active");
            return;
        }

        let total = composition.total_duration();
        if total.is_zero() {
            self.notifier
                .show_error("Nothing to record: the composition has no playable scenes");
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        let ticks = self.timing.countdown_ticks;
        tracing::info!(
            session = id,
            scenes = composition.scenes.len(),
            total_secs = total.as_secs_f64(),
            quality = %settings.quality,
            format = %settings.format,
            mode = ?settings.capture_mode,
            "Starting recording session"
        );

        self.session = Some(RecordingSession::new(id, settings, total, ticks));
        self.state = SessionSnapshot {
            countdown: ticks,
            ..SessionSnapshot::default()
        };

        if ticks == 0 {
            self.set_status(SessionStatus::Countdown);
            self.acquire(id);
            return;
        }

        let timer = spawn_every(
            &self.session_tx,
            id,
            self.timing.countdown_tick(),
            || SessionEvent::CountdownTick,
        );
        if let Some(session) = self.session.as_mut() {
            session.countdown_timer = Some(timer);
        }
        self.set_status(SessionStatus::Countdown);
    }

    fn countdown_tick(&mut self, id: SessionId) {
        if self.state.status != SessionStatus::Countdown {
            return;
        }
        let Some(session) = self.session.as_mut().filter(|s| s.id == id) else {
            return;
        };
        if session.countdown_remaining == 0 {
            return;
        }

        session.countdown_remaining -= 1;
        let remaining = session.countdown_remaining;
        if remaining == 0 {
            session.countdown_timer = None;
        }
        self.state.countdown = remaining;
        self.publish();

        if remaining == 0 {
            self.acquire(id);
        }
    }

    fn acquire(&mut self, id: SessionId) {
        let selector = self.selector.clone();
        let tx = self.session_tx.clone();
        let Some(session) = self.current(id) else {
            return;
        };

        let mode = session.settings.capture_mode;
        let preset = session.preset;
        tracing::debug!(session = id, ?mode, "Acquiring capture stream");
        session.acquisition = Some(TaskGuard(tokio::spawn(async move {
            let result = selector.open_stream(mode, preset).await;
            let _ = tx.send((id, SessionEvent::StreamOpened(result)));
        })));
    }

    fn stream_opened(&mut self, id: SessionId, result: SlidecastResult<B::Stream>) {
        let waiting = self.state.status == SessionStatus::Countdown && self.current(id).is_some();
        if !waiting {
            if let Ok(mut stream) = result {
                tracing::debug!(session = id, "Releasing stream acquired for a stale session");
                if let Err(e) = stream.stop_tracks() {
                    tracing::warn!(session = id, error = %e, "Failed to stop stale stream");
                }
            }
            return;
        }

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => return self.fail_start(e),
        };

        let timeslice = self.timing.chunk_timeslice();
        let events = EncoderEvents::new(id, self.encoder_tx.clone());
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.acquisition = None;
        let config = negotiator::resolve(
            self.backend.as_ref(),
            session.settings.quality,
            session.settings.format,
        );
        tracing::debug!(session = id, tracks = ?stream.tracks(), "Capture stream opened");
        let stream = session.stream.insert(stream);

        let encoder = Self::open_encoder(self.backend.as_ref(), stream, &config, events, timeslice);
        let encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => return self.fail_start(e),
        };

        session.encoder = Some(encoder);
        let clock = RecordingClock::start();
        tracing::info!(
            session = id,
            mime_type = %config.mime_type,
            started_at = clock.epoch_wall(),
            "Recording started"
        );
        session.encoder_config = Some(config);
        session.clock = Some(clock);
        session.progress_timer = Some(spawn_every(
            &self.session_tx,
            id,
            self.timing.progress_interval(),
            || SessionEvent::ProgressTick,
        ));
        session.deadline_timer = Some(spawn_after(
            &self.session_tx,
            id,
            session.total.saturating_add(self.timing.deadline_grace()),
            SessionEvent::Deadline,
        ));
        self.set_status(SessionStatus::Recording);
    }

    fn open_encoder(
        backend: &B,
        stream: &mut B::Stream,
        config: &EncoderConfig,
        events: EncoderEvents,
        timeslice: Duration,
    ) -> SlidecastResult<B::Encoder> {
        let mut encoder = backend.create_encoder(stream, config, events)?;
        encoder.start(timeslice)?;
        Ok(encoder)
    }

    fn fail_start(&mut self, error: SlidecastError) {
        let error = error.into_capture_start_failed();
        tracing::warn!(error = %error, "Recording could not start");
        self.session = None;
        self.state = SessionSnapshot::default();
        self.set_status(SessionStatus::Idle);
        self.notifier.show_error(&error.to_string());
    }

    /// Leave `recording`: stop timers, ask the encoder to drain and release
    /// the stream. Finalization waits for the encoder's stop signal.
    fn begin_stop(&mut self, cancelled: bool) {
        let drain_timeout = self.timing.drain_timeout();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.cancelled |= cancelled;
        session.progress_timer = None;
        session.deadline_timer = None;
        let elapsed = session.elapsed();

        let stop_result = match session.encoder.as_mut() {
            Some(encoder) => encoder.request_stop(),
            None => Err(SlidecastError::Other(anyhow::anyhow!("no encoder to stop"))),
        };
        session.release_stream();

        let drained = match stop_result {
            Ok(()) => {
                session.drain_timer = Some(spawn_after(
                    &self.session_tx,
                    session.id,
                    drain_timeout,
                    SessionEvent::DrainTimeout,
                ));
                false
            }
            Err(e) => {
                tracing::warn!(session = session.id, error = %e, "Encoder stop failed");
                true
            }
        };

        self.state.elapsed_secs = elapsed.as_secs_f64();
        self.set_status(SessionStatus::Processing);
        if drained {
            self.complete();
        }
    }

    fn cancel(&mut self) {
        match self.state.status {
            SessionStatus::Countdown => {
                tracing::info!("Countdown cancelled");
                self.session = None;
                self.state = SessionSnapshot::default();
                self.set_status(SessionStatus::Idle);
            }
            SessionStatus::Recording => self.begin_stop(true),
            SessionStatus::Processing => {
                if let Some(session) = self.session.as_mut() {
                    session.cancelled = true;
                }
            }
            SessionStatus::Idle | SessionStatus::Done => {
                tracing::debug!(status = ?self.state.status, "Cancel ignored");
            }
        }
    }

    /// `processing -> done` (or `idle` when cancelled).
    fn complete(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let chunks = std::mem::take(&mut session.chunks);
        let cancelled = session.cancelled;
        let config = session.encoder_config.clone();
        let (mime_type, extension) = config
            .as_ref()
            .map(|c| (c.container_mime(), c.file_extension()))
            .unwrap_or_else(|| (negotiator::BASELINE_MIME_TYPE.to_string(), ".webm"));
        let filename = output_filename(&session.settings.filename, session.preset.suffix, extension);
        let id = session.id;
        drop(session);

        if chunks.is_empty() {
            tracing::warn!(session = id, "Recording produced no data; nothing to save");
            if !cancelled {
                self.notifier.show_error("Recording produced no video data");
            }
        } else {
            match finalize(chunks, &mime_type, filename, self.sink.as_ref()) {
                FinalizeOutcome::Saved { path, .. } => {
                    self.pending_save = None;
                    if !cancelled {
                        self.notifier
                            .show_success(&format!("Video saved to {}", path.display()));
                    }
                }
                FinalizeOutcome::Retained { video, error } => {
                    self.notifier
                        .show_error(&format!("Could not save {}: {error}", video.filename));
                    self.pending_save = Some(video);
                }
            }
        }

        if cancelled {
            self.state.progress = 0.0;
            self.set_status(SessionStatus::Idle);
        } else {
            self.state.progress = 100.0;
            self.set_status(SessionStatus::Done);
        }
    }

    fn retry_save(&mut self) {
        let Some(video) = self.pending_save.take() else {
            tracing::debug!("Nothing to retry");
            return;
        };

        match video.save(self.sink.as_ref()) {
            Ok(path) => {
                self.notifier
                    .show_success(&format!("Video saved to {}", path.display()));
            }
            Err(e) => {
                self.notifier
                    .show_error(&format!("Could not save {}: {e}", video.filename));
                self.pending_save = Some(video);
            }
        }
        self.state.pending_save = self.pending_save.is_some();
        self.publish();
    }
}
