//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the capture pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// The host rasterization primitive failed (tab not capturable,
    /// permission denied, decode failure). Aborts the active session.
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// A capture was requested for a target that already has an active session
    #[error("A capture session is already active for target '{0}'")]
    SessionAlreadyActive(String),

    /// Scroll-settle or overall session wall-clock bound exceeded
    #[error("Session timed out after {0}ms")]
    Timeout(u64),

    /// The compositor was invoked with zero frames
    #[error("No frames to compose")]
    EmptyFrameSet,

    /// A selection region with non-positive extents, or one that does not
    /// intersect the viewport
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// The session was cancelled before completion
    #[error("Capture session cancelled")]
    Cancelled,

    /// Image encoding failed
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Filesystem error while persisting the composite
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific error (navigation, script evaluation)
    #[error("Backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Backend(err.to_string())
    }
}
