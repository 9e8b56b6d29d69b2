/// Errors surfaced outside the dispatcher.
///
/// Protocol faults never reach this type; they become console diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The event loop has stopped and no longer accepts events.
    #[error("event channel closed")]
    ChannelClosed,

    /// Reading from the inbound link failed.
    #[error("link read failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
