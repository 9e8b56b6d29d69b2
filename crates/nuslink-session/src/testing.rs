//! Recording collaborators for unit tests.

use std::path::PathBuf;

use nuslink_transport::{CommandSink, FileStore, StoreError, TransportError};

#[derive(Debug)]
pub struct RecordingSink {
    pub sent: Vec<Vec<u8>>,
    pub connected: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
        }
    }
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.sent.iter().filter(|b| b.as_slice() == text.as_bytes()).count()
    }
}

impl CommandSink for RecordingSink {
    fn send(&mut self, bytes: &[u8]) -> nuslink_transport::Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub declared_size: u64,
    pub packets: Vec<Vec<u8>>,
}

impl StoredFile {
    pub fn data(&self) -> Vec<u8> {
        self.packets.concat()
    }

    pub fn packet_lens(&self) -> Vec<usize> {
        self.packets.iter().map(Vec::len).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub files: Vec<StoredFile>,
    pub current: Option<StoredFile>,
    pub abandoned: Vec<StoredFile>,
    pub fail_begin: bool,
    pub fail_store_at: Option<usize>,
}

fn disk_full(name: &str) -> StoreError {
    StoreError::Io {
        path: PathBuf::from(name),
        source: std::io::Error::other("disk full"),
    }
}

impl FileStore for MemoryStore {
    fn begin(&mut self, filename: &str, declared_size: u64) -> Result<(), StoreError> {
        if self.fail_begin {
            return Err(disk_full(filename));
        }
        if let Some(current) = &self.current {
            return Err(StoreError::AlreadyOpen(current.name.clone()));
        }
        self.current = Some(StoredFile {
            name: filename.to_string(),
            declared_size,
            packets: Vec::new(),
        });
        Ok(())
    }

    fn store(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let current = self.current.as_mut().ok_or(StoreError::NotOpen)?;
        if self.fail_store_at == Some(current.packets.len()) {
            return Err(disk_full(&current.name));
        }
        current.packets.push(bytes.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<PathBuf, StoreError> {
        let current = self.current.take().ok_or(StoreError::NotOpen)?;
        let path = PathBuf::from(&current.name);
        self.files.push(current);
        Ok(path)
    }

    fn abandon(&mut self) {
        if let Some(current) = self.current.take() {
            self.abandoned.push(current);
        }
    }
}
