//! Slidecast Common Utilities
//!
//! Shared infrastructure for all Slidecast crates:
//! - Error types and result aliases
//! - Clock and timing utilities for recording sessions
//! - Tracing/logging initialization
//! - Configuration loading
//! - Notification and download sinks (the outward-facing boundaries)

pub mod artifact;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;

pub use artifact::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use notify::*;
