/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or supplied payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly before the first byte of a frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended part-way through a length prefix or payload.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },
}

impl FrameError {
    /// Whether the error means the peer went away rather than sent bad data.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            FrameError::ConnectionClosed | FrameError::Truncated { .. }
        ) || matches!(self, FrameError::Io(err) if err.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
