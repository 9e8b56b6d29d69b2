use std::path::PathBuf;

/// Errors raised while sending outbound bytes or attaching to a bridge.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No link is attached, so nothing can be sent.
    #[error("not connected")]
    NotConnected,

    /// Failed to connect to the bridge socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The peer closed the link while a write was in progress.
    #[error("link closed")]
    Closed,

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`FileStore`](crate::FileStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `store` or `finish` was called with no file open.
    #[error("no file is open")]
    NotOpen,

    /// A file is already open; only one transfer may write at a time.
    #[error("file {0} is already open")]
    AlreadyOpen(String),

    /// The filename cannot be used inside the store directory.
    #[error("refusing unsafe filename {0:?}")]
    UnsafeName(String),

    /// Filesystem failure for a specific path.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
