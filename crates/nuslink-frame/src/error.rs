/// Errors raised while decoding the notification stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A line ran past the configured bound and was dropped.
    #[error("line too long ({len} bytes, max {max})")]
    LineTooLong { len: usize, max: usize },

    /// The sentinel marker was present but not followed by `<name>,<size>`.
    #[error("malformed transfer directive: {0:?}")]
    MalformedDirective(String),

    /// The declared size is not a non-negative base-10 integer.
    #[error("invalid declared size {0:?}")]
    InvalidSize(String),

    /// No usable filename remains after stripping path components.
    #[error("invalid filename {0:?}")]
    InvalidFilename(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
