//! Slidecast Project Model
//!
//! Defines the core data contracts for Slidecast projects:
//! - **Scenes:** Timed units of a composition (title, content, duration)
//! - **Composition:** The ordered scene list plus presentation settings
//! - **Export:** Quality presets, container formats, capture modes, filenames
//! - **Document:** The portable, versioned project file and its import/export
//!
//! Durations are expressed in seconds as `f64` on the wire and converted to
//! `std::time::Duration` at the boundary with the capture engine.

pub mod document;
pub mod export;
pub mod scene;

pub use document::*;
pub use export::*;
pub use scene::*;
