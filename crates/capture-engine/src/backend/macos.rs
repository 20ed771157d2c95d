use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::backend::{CapturePlatform, StreamConstraints, SurfaceHandle};
use crate::pipeline::SourceDescription;

const VIDEO_ELEMENT: &str = "avfvideosrc";

/// Main display capture through AVFoundation.
///
/// macOS exposes no system-audio loopback without a virtual device, so the
/// stream is always video only.
pub fn display_source(
    platform: CapturePlatform,
    constraints: &StreamConstraints,
    has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    if platform != CapturePlatform::MacOS {
        return Err(SlidecastError::source_unavailable(format!(
            "macOS capture requested on {platform:?}"
        )));
    }
    if !has_element(VIDEO_ELEMENT) {
        return Err(SlidecastError::source_unavailable(
            "GStreamer element 'avfvideosrc' is not installed",
        ));
    }
    if constraints.system_audio {
        tracing::debug!("System audio capture is not available on macOS");
    }

    Ok(SourceDescription {
        video: format!("{VIDEO_ELEMENT} capture-screen=true capture-screen-cursor=true"),
        audio: None,
    })
}

pub fn surface_source(
    _platform: CapturePlatform,
    _surface: &SurfaceHandle,
    _has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    Err(SlidecastError::source_unavailable(
        "Capturing a single surface is not supported on macOS",
    ))
}
