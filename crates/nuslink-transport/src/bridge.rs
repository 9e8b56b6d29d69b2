use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, TransportError};

/// A connection to a local bridge process that owns the BLE link.
///
/// The bridge forwards every notification from the peripheral's TX
/// characteristic verbatim as stream bytes and writes whatever it reads from
/// us to the RX characteristic. Chunk boundaries are not preserved.
pub struct BridgeStream {
    inner: UnixStream,
    path: PathBuf,
}

impl BridgeStream {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Connect to a bridge listening on `path`.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let inner = UnixStream::connect(&path).map_err(|source| TransportError::Connect {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "connected to bridge");

        Ok(Self { inner, path })
    }

    /// Wrap an already connected stream (e.g. one half of `UnixStream::pair`).
    pub fn from_stream(inner: UnixStream, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }

    /// Path this stream was connected to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone the handle so reads and writes can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            path: self.path.clone(),
        })
    }

    /// Shut down both directions; blocked readers on clones observe EOF.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Read for BridgeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BridgeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for BridgeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeStream")
            .field("path", &self.path)
            .finish()
    }
}
