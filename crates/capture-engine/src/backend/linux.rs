use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::backend::{parse_surface_id, CapturePlatform, StreamConstraints, SurfaceHandle};
use crate::pipeline::SourceDescription;

const VIDEO_ELEMENT: &str = "ximagesrc";
const MONITOR_AUDIO_ELEMENT: &str = "pulsesrc";

/// Whole-display capture on an X11 session.
///
/// `use-damage=false` ensures full frame delivery. System audio comes from
/// the default PulseAudio/PipeWire monitor when `pulsesrc` is installed.
pub fn display_source(
    platform: CapturePlatform,
    constraints: &StreamConstraints,
    has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    ensure_x11(platform)?;
    if !has_element(VIDEO_ELEMENT) {
        return Err(SlidecastError::source_unavailable(
            "GStreamer element 'ximagesrc' is not installed",
        ));
    }

    let audio = if constraints.system_audio && has_element(MONITOR_AUDIO_ELEMENT) {
        Some(format!(
            "{MONITOR_AUDIO_ELEMENT} device=@DEFAULT_MONITOR@ do-timestamp=true"
        ))
    } else {
        if constraints.system_audio {
            tracing::debug!("No monitor audio source available; recording video only");
        }
        None
    };

    Ok(SourceDescription {
        video: format!("{VIDEO_ELEMENT} use-damage=false show-pointer=true"),
        audio,
    })
}

/// Capture of a single X11 window, addressed by its XID. Video only.
pub fn surface_source(
    platform: CapturePlatform,
    surface: &SurfaceHandle,
    has_element: &dyn Fn(&str) -> bool,
) -> SlidecastResult<SourceDescription> {
    ensure_x11(platform)?;
    if !has_element(VIDEO_ELEMENT) {
        return Err(SlidecastError::source_unavailable(
            "GStreamer element 'ximagesrc' is not installed",
        ));
    }

    let xid = parse_surface_id(&surface.id)?;
    Ok(SourceDescription {
        video: format!("{VIDEO_ELEMENT} xid={xid} use-damage=false show-pointer=false"),
        audio: None,
    })
}

fn ensure_x11(platform: CapturePlatform) -> SlidecastResult<()> {
    match platform {
        CapturePlatform::X11 => Ok(()),
        CapturePlatform::Wayland => Err(SlidecastError::source_unavailable(
            "Screen capture on Wayland requires the ScreenCast portal, which is not supported",
        )),
        other => Err(SlidecastError::source_unavailable(format!(
            "No X11 display available (detected {other:?})"
        ))),
    }
}
