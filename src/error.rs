// ============================================================================
// Error type shared by the engine, the worker and the CLI
// ============================================================================

/// Every failure a healing request can report.
///
/// Degenerate brush geometry (ROI clipped too small, empty sampling ring,
/// nothing to solve) is deliberately absent: those are "no effect" outcomes,
/// not errors.
#[derive(Debug, thiserror::Error)]
pub enum HealError {
    /// Pixel data does not match the declared dimensions.
    #[error("invalid rgba buffer: {0}")]
    InvalidBuffer(String),

    #[error("invalid buffer size {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    /// A preview dab arrived before any preview image was set.
    #[error("preview image not set")]
    PreviewNotSet,

    /// The worker thread is gone (terminated or crashed).
    #[error("healing worker not available")]
    WorkerGone,

    #[error("timed out waiting for reply {0}")]
    Timeout(u64),

    /// The request panicked inside the worker; the session survives.
    #[error("healing worker panicked: {0}")]
    WorkerPanic(String),

    /// The worker answered a call with the wrong kind of reply.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("unknown request id {0}")]
    UnknownRequest(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("stroke file: {0}")]
    StrokeFile(String),
}

impl From<Box<bincode::ErrorKind>> for HealError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        HealError::StrokeFile(e.to_string())
    }
}

pub type HealResult<T> = Result<T, HealError>;
