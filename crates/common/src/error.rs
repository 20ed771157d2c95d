//! Error types shared across Slidecast crates.

/// Top-level error type for Slidecast operations.
#[derive(Debug, thiserror::Error)]
pub enum SlidecastError {
    #[error("Capture could not start: {cause}")]
    CaptureStartFailed { cause: String },

    #[error("Capture source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("No usable encoder: {message}")]
    EncoderUnavailable { message: String },

    #[error("Invalid project document: {message}")]
    InvalidDocument { message: String },

    #[error("Save failed: {message}")]
    Save { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SlidecastError.
pub type SlidecastResult<T> = Result<T, SlidecastError>;

impl SlidecastError {
    pub fn capture_start(cause: impl Into<String>) -> Self {
        Self::CaptureStartFailed {
            cause: cause.into(),
        }
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoder_unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            message: msg.into(),
        }
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: msg.into(),
        }
    }

    pub fn save(msg: impl Into<String>) -> Self {
        Self::Save {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Fold any capture-side failure into the single user-facing
    /// `CaptureStartFailed` kind, keeping the original text as the cause.
    pub fn into_capture_start_failed(self) -> Self {
        match self {
            Self::CaptureStartFailed { .. } => self,
            other => Self::CaptureStartFailed {
                cause: other.to_string(),
            },
        }
    }

    /// Whether this error is the retryable capture-start kind.
    pub fn is_capture_start_failed(&self) -> bool {
        matches!(self, Self::CaptureStartFailed { .. })
    }
}
