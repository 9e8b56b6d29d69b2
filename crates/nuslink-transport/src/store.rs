use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::traits::FileStore;

const PARTIAL_SUFFIX: &str = ".part";

/// Stores received files inside one directory.
///
/// Bytes are written to `<name>.part` while the transfer is open and the
/// file is renamed to `<name>` on [`finish`](FileStore::finish), so a
/// half-received file never shadows a complete one.
#[derive(Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    open: Option<OpenFile>,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    partial: PathBuf,
    target: PathBuf,
    written: u64,
}

impl DirectoryStore {
    /// Use `dir` as the destination, creating it if missing.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, open: None })
    }

    /// Whether a file is currently open.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

impl FileStore for DirectoryStore {
    fn begin(&mut self, filename: &str, declared_size: u64) -> Result<(), StoreError> {
        if let Some(open) = &self.open {
            return Err(StoreError::AlreadyOpen(open.target.display().to_string()));
        }
        if !is_plain_name(filename) {
            return Err(StoreError::UnsafeName(filename.to_string()));
        }

        let target = self.dir.join(filename);
        let partial = self.dir.join(format!("{filename}{PARTIAL_SUFFIX}"));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial)
            .map_err(|source| StoreError::Io {
                path: partial.clone(),
                source,
            })?;

        debug!(path = %partial.display(), declared_size, "opened partial file");
        self.open = Some(OpenFile {
            file,
            partial,
            target,
            written: 0,
        });
        Ok(())
    }

    fn store(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let open = self.open.as_mut().ok_or(StoreError::NotOpen)?;
        open.file
            .write_all(bytes)
            .map_err(|source| StoreError::Io {
                path: open.partial.clone(),
                source,
            })?;
        open.written += bytes.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<PathBuf, StoreError> {
        let open = self.open.take().ok_or(StoreError::NotOpen)?;
        let OpenFile {
            file,
            partial,
            target,
            written,
        } = open;

        if let Err(source) = file.sync_all() {
            let _ = std::fs::remove_file(&partial);
            return Err(StoreError::Io {
                path: partial,
                source,
            });
        }
        drop(file);

        if let Err(source) = std::fs::rename(&partial, &target) {
            let _ = std::fs::remove_file(&partial);
            return Err(StoreError::Io {
                path: target,
                source,
            });
        }

        info!(path = %target.display(), bytes = written, "file stored");
        Ok(target)
    }

    fn abandon(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        drop(open.file);
        if let Err(err) = std::fs::remove_file(&open.partial) {
            warn!(path = %open.partial.display(), error = %err, "failed removing partial file");
        } else {
            debug!(path = %open.partial.display(), bytes = open.written, "partial file removed");
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "nuslink-store-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn finish_publishes_file() {
        let dir = unique_dir("finish");
        let mut store = DirectoryStore::new(&dir).unwrap();

        store.begin("calib.bin", 6).unwrap();
        assert!(dir.join("calib.bin.part").exists());
        store.store(b"abc").unwrap();
        store.store(b"def").unwrap();
        let path = store.finish().unwrap();

        assert_eq!(path, dir.join("calib.bin"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        assert!(!dir.join("calib.bin.part").exists());
        assert!(!store.is_open());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn abandon_removes_partial() {
        let dir = unique_dir("abandon");
        let mut store = DirectoryStore::new(&dir).unwrap();

        store.begin("log.bin", 100).unwrap();
        store.store(b"partial").unwrap();
        store.abandon();

        assert!(!dir.join("log.bin.part").exists());
        assert!(!dir.join("log.bin").exists());
        store.abandon();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_path_components() {
        let dir = unique_dir("unsafe");
        let mut store = DirectoryStore::new(&dir).unwrap();

        for name in ["../escape.bin", "a/b", "..", "", "c:\\x"] {
            let err = store.begin(name, 1).unwrap_err();
            assert!(matches!(err, StoreError::UnsafeName(_)), "{name}");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn only_one_file_open() {
        let dir = unique_dir("single");
        let mut store = DirectoryStore::new(&dir).unwrap();

        store.begin("one.bin", 1).unwrap();
        let err = store.begin("two.bin", 1).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyOpen(_)));
        store.abandon();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_without_begin_fails() {
        let dir = unique_dir("notopen");
        let mut store = DirectoryStore::new(&dir).unwrap();

        assert!(matches!(store.store(b"x"), Err(StoreError::NotOpen)));
        assert!(matches!(store.finish(), Err(StoreError::NotOpen)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
