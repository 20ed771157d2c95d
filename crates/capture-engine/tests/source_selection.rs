mod support;

use std::time::Duration;

use slidecast_capture_engine::{
    CaptureSourceSelector, LiveStream, SessionSnapshot, SessionStatus, SurfaceHandle, TrackKind,
};
use slidecast_project_model::{CaptureMode, ContainerFormat, ExportSettings, QualityTier};
use support::{ten_second_deck, FakeBackend, Harness};

fn editor_surface() -> SurfaceHandle {
    SurfaceHandle {
        id: "0x4a00003".to_string(),
        width: 1280,
        height: 720,
    }
}

fn is(status: SessionStatus) -> impl Fn(&SessionSnapshot) -> bool {
    move |s: &SessionSnapshot| s.status == status
}

#[tokio::test]
async fn editor_surface_without_surface_is_capture_start_failed() {
    let selector = CaptureSourceSelector::new(FakeBackend::new());
    let err = selector
        .open_stream(CaptureMode::EditorSurface, QualityTier::Hd.preset())
        .await
        .err()
        .expect("no surface attached");
    assert!(err.is_capture_start_failed());
    assert!(err.to_string().contains("no editor surface"));
}

#[tokio::test]
async fn editor_surface_stream_has_no_audio() {
    let backend = FakeBackend::new();
    let mut selector = CaptureSourceSelector::new(backend.clone());
    selector.set_surface(Some(editor_surface()));

    let stream = selector
        .open_stream(CaptureMode::EditorSurface, QualityTier::Draft.preset())
        .await
        .expect("surface stream");
    assert_eq!(stream.tracks(), [TrackKind::Video]);
    assert!(!stream.has_audio());
    assert_eq!(backend.state().surface_streams, 1);
}

#[tokio::test]
async fn whole_display_requests_preset_constraints_with_audio() {
    let backend = FakeBackend::new();
    let selector = CaptureSourceSelector::new(backend.clone());

    let stream = selector
        .open_stream(CaptureMode::WholeDisplay, QualityTier::Uhd4k.preset())
        .await
        .expect("display stream");
    assert!(stream.has_audio());

    let constraints = backend.state().last_constraints.expect("constraints recorded");
    assert_eq!(constraints.frame_rate, 30);
    assert_eq!((constraints.width, constraints.height), (3840, 2160));
    assert!(constraints.system_audio);
}

#[tokio::test]
async fn backend_rejection_is_folded_into_capture_start_failed() {
    let backend = FakeBackend::new();
    backend.state().fail_open = Some("screen sharing blocked".to_string());
    let selector = CaptureSourceSelector::new(backend);

    let err = selector
        .open_stream(CaptureMode::WholeDisplay, QualityTier::Hd.preset())
        .await
        .err()
        .expect("open should fail");
    assert!(err.is_capture_start_failed());
    assert!(err.to_string().contains("screen sharing blocked"));
}

#[tokio::test(start_paused = true)]
async fn controller_records_attached_surface() {
    let mut h = Harness::new(FakeBackend::new());
    let settings = ExportSettings::new(
        QualityTier::Hd,
        ContainerFormat::Webm,
        CaptureMode::EditorSurface,
        "slides",
    );

    h.handle.start(settings.clone(), ten_second_deck()).unwrap();
    h.wait_for(is(SessionStatus::Countdown)).await;
    h.wait_for(is(SessionStatus::Idle)).await;
    assert!(h.notifier.errors()[0].contains("no editor surface"));

    h.handle.attach_surface(Some(editor_surface())).unwrap();
    h.handle.start(settings, ten_second_deck()).unwrap();
    h.wait_for(is(SessionStatus::Recording)).await;
    h.backend.emit(b"frame");
    h.handle.stop().unwrap();
    h.wait_for(is(SessionStatus::Done)).await;

    let state = h.backend.state();
    assert_eq!(state.surface_streams, 1);
    assert_eq!(state.last_stream_audio, Some(false));
    assert_eq!(h.sink.saved()[0].filename, "slides_720p.webm");
}

#[tokio::test(start_paused = true)]
async fn detaching_surface_makes_next_start_fail() {
    let mut h = Harness::new(FakeBackend::new());
    let settings = ExportSettings::new(
        QualityTier::Draft,
        ContainerFormat::Webm,
        CaptureMode::EditorSurface,
        "slides",
    );

    h.handle.attach_surface(Some(editor_surface())).unwrap();
    h.handle.attach_surface(None).unwrap();
    h.handle.start(settings, ten_second_deck()).unwrap();
    h.wait_for(is(SessionStatus::Countdown)).await;
    h.wait_for(is(SessionStatus::Idle)).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.backend.state().streams_opened, 0);
    assert_eq!(h.notifier.errors().len(), 1);
}
