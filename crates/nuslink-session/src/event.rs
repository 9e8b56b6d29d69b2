use bytes::Bytes;

/// One entry in the dispatcher's ordered input queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A chunk delivered by the link, with no alignment to lines or packets.
    Bytes(Bytes),
    /// The watchdog deadline passed.
    WatchdogExpired,
    /// User-issued command text to forward to the peripheral.
    Command(String),
    /// The link went away; any open transfer is abandoned.
    Disconnect,
    /// Like `Disconnect`, and the event loop stops afterwards.
    Shutdown,
}

impl From<Bytes> for Event {
    fn from(chunk: Bytes) -> Self {
        Event::Bytes(chunk)
    }
}

impl From<&'static [u8]> for Event {
    fn from(chunk: &'static [u8]) -> Self {
        Event::Bytes(Bytes::from_static(chunk))
    }
}

impl From<Vec<u8>> for Event {
    fn from(chunk: Vec<u8>) -> Self {
        Event::Bytes(Bytes::from(chunk))
    }
}
