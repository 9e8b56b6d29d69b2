use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::error::{Result, StoreError, TransportError};

/// Outbound half of the link: carries command bytes to the peripheral.
///
/// Sends are fire-and-forget from the caller's view. An implementation may
/// block until the bytes are handed to the OS, but it never waits for any
/// peripheral-level confirmation.
pub trait CommandSink {
    /// Send one buffer of raw bytes.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}

/// Durable destination for the bytes of one received file at a time.
pub trait FileStore {
    /// Open a new file. `filename` has already had path components stripped.
    fn begin(&mut self, filename: &str, declared_size: u64) -> std::result::Result<(), StoreError>;

    /// Append one completed packet to the open file.
    fn store(&mut self, bytes: &[u8]) -> std::result::Result<(), StoreError>;

    /// Close the open file and make it visible. Returns its final location.
    fn finish(&mut self) -> std::result::Result<PathBuf, StoreError>;

    /// Drop the open file without publishing it. No-op when nothing is open.
    fn abandon(&mut self);
}

impl<T: FileStore + ?Sized> FileStore for &mut T {
    fn begin(&mut self, filename: &str, declared_size: u64) -> std::result::Result<(), StoreError> {
        (**self).begin(filename, declared_size)
    }

    fn store(&mut self, bytes: &[u8]) -> std::result::Result<(), StoreError> {
        (**self).store(bytes)
    }

    fn finish(&mut self) -> std::result::Result<PathBuf, StoreError> {
        (**self).finish()
    }

    fn abandon(&mut self) {
        (**self).abandon()
    }
}

/// Writes commands to any `Write` stream.
pub struct StreamSink<W> {
    inner: Option<W>,
}

impl<W: Write> StreamSink<W> {
    /// Wrap a connected writer.
    pub fn new(inner: W) -> Self {
        Self { inner: Some(inner) }
    }

    /// A sink with no link attached; every send fails with `NotConnected`.
    pub fn disconnected() -> Self {
        Self { inner: None }
    }

    /// Whether a writer is attached.
    pub fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    /// Detach and return the writer.
    pub fn take(&mut self) -> Option<W> {
        self.inner.take()
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }
}

impl<W: Write> CommandSink for StreamSink<W> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(TransportError::NotConnected)?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

/// Accepts and drops every command. Used when replaying a captured stream.
#[derive(Debug, Default)]
pub struct DiscardSink {
    sent: usize,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers dropped so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl CommandSink for DiscardSink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent = self.sent.saturating_add(1);
        tracing::debug!(len = bytes.len(), "discarding outbound command");
        Ok(())
    }
}
