//! User-facing notifications.
//!
//! The core reports outcomes (saved video, failed capture start, bad
//! project document) through a [`Notifier`]. Calls are fire-and-forget;
//! nothing is read back from the implementation.

/// Receiver of success and error messages meant for the user.
pub trait Notifier: Send + Sync {
    fn show_success(&self, message: &str);

    fn show_error(&self, message: &str);
}

/// Notifier that forwards every message to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_success(&self, message: &str) {
        tracing::info!(target: "slidecast::notify", "{message}");
    }

    fn show_error(&self, message: &str) {
        tracing::error!(target: "slidecast::notify", "{message}");
    }
}
