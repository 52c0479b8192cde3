use stackpipe_frame::FrameError;

/// Errors raised while decoding or validating a stack header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// The header payload is not UTF-8 text.
    #[error("header is not valid UTF-8")]
    InvalidUtf8,

    /// A required key is absent.
    #[error("missing header field {0}")]
    MissingField(&'static str),

    /// A numeric key holds something other than a decimal integer.
    #[error("header field {field} is not a decimal integer: {value:?}")]
    InvalidNumeric { field: &'static str, value: String },

    /// Only 8-bit and 16-bit stacks are supported.
    #[error("unsupported bit depth {0} (expected 8 or 16)")]
    UnsupportedBitDepth(u32),

    /// A dimension is zero.
    #[error("header field {0} must be positive")]
    ZeroDimension(&'static str),

    /// The declared dimensions describe more data than can be addressed.
    #[error("declared stack dimensions overflow")]
    DimensionOverflow,
}

/// Errors raised while sending or receiving a stack.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Frame-level failure on the underlying stream.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Header failed to decode or validate.
    #[error("malformed header: {0}")]
    Header(#[from] HeaderError),

    /// A plane's byte length disagrees with the declared dimensions.
    #[error("plane {index} has {actual} bytes, expected {expected}")]
    PlaneSize {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// The header's bit depth disagrees with the plane buffers.
    #[error("header declares {declared}-bit samples but planes are {actual}-bit")]
    DepthMismatch { declared: u32, actual: u32 },

    /// The number of planes disagrees with `Channels*Slices*Frames`.
    #[error("stack has {actual} planes, expected {expected}")]
    PlaneCount { expected: usize, actual: usize },
}

impl StackError {
    /// Whether the failure came from the byte stream rather than its content.
    pub fn is_io(&self) -> bool {
        matches!(self, StackError::Frame(_))
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
