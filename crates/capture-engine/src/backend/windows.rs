use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::backend::{parse_surface_id, CapturePlatform, StreamConstraints, SurfaceHandle};
use crate::pipeline::SourceDescription;

const VIDEO_ELEMENT: &str = "d3d11screencapturesrc";
const LOOPBACK_AUDIO_ELEMENT: &str = "wasapisrc";

/// Primary monitor capture through Desktop Duplication, with WASAPI loopback
/// for system audio.
pub fn display_source(
    platform: CapturePlatform,
    constraints: &StreamConstraints,
    has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    ensure_windows(platform)?;
    if !has_element(VIDEO_ELEMENT) {
        return Err(SlidecastError::source_unavailable(
            "GStreamer element 'd3d11screencapturesrc' is not installed",
        ));
    }

    let audio = (constraints.system_audio && has_element(LOOPBACK_AUDIO_ELEMENT)).then(|| {
        format!("{LOOPBACK_AUDIO_ELEMENT} loopback=true low-latency=true do-timestamp=true")
    });

    Ok(SourceDescription {
        video: format!("{VIDEO_ELEMENT} monitor-index=0 show-cursor=true"),
        audio,
    })
}

/// Capture of one window by HWND. Video only.
pub fn surface_source(
    platform: CapturePlatform,
    surface: &SurfaceHandle,
    has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    ensure_windows(platform)?;
    if !has_element(VIDEO_ELEMENT) {
        return Err(SlidecastError::source_unavailable(
            "GStreamer element 'd3d11screencapturesrc' is not installed",
        ));
    }

    let hwnd = parse_surface_id(&surface.id)?;
    Ok(SourceDescription {
        video: format!("{VIDEO_ELEMENT} window-handle={hwnd} show-cursor=false"),
        audio: None,
    })
}

fn ensure_windows(platform: CapturePlatform) -> SlidecastResult<()> {
    if platform == CapturePlatform::Windows {
        Ok(())
    } else {
        Err(SlidecastError::source_unavailable(format!(
            "Windows capture requested on {platform:?}"
        )))
    }
}
