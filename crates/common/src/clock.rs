//! Clock and timing utilities for recording sessions.
//!
//! A recording is anchored to a monotonic epoch captured when the encoder
//! starts. Elapsed time drives progress reporting; the epoch instant comes
//! from `tokio::time` so that a paused test runtime controls it.

use std::time::Duration;

use tokio::time::Instant;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment capture started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time since recording start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Progress percentage for `elapsed` out of `total`.
///
/// Capped at 99 so a session never reports completion before its output is
/// finalized. A zero `total` reports the cap.
pub fn capped_progress(elapsed: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 99.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64() * 100.0).clamp(0.0, 99.0)
}

/// Rate limiter for flushing data on a fixed interval.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller that ticks at most once per `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            target_interval_ns: interval.as_nanos() as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }
}
