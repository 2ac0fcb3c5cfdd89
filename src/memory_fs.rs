// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An in-memory [`FileSystem`] backend, for tests that should not touch disk.

use crate::fs::{FileHandle, FileSystem};
use std::{
    collections::HashMap,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

#[derive(Debug, Default)]
struct Bytes(Mutex<Vec<u8>>);

/// A file living entirely in memory.
#[derive(Debug, Clone)]
pub struct MemFile(Arc<Bytes>);

impl FileHandle for MemFile {
    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut buf = self.0 .0.lock().expect("lock poisoned");
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let buf = self.0 .0.lock().expect("lock poisoned");

        let offset = offset as usize;
        if offset >= buf.len() {
            return Ok(Vec::new());
        }

        let end = (offset + len).min(buf.len());
        #[allow(clippy::indexing_slicing)]
        Ok(buf[offset..end].to_vec())
    }

    fn size(&self) -> io::Result<u64> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let buf = self.0 .0.lock().expect("lock poisoned");
        Ok(buf.len() as u64)
    }
}

/// An in-memory directory, keyed by full path.
///
/// Every [`InMemoryFileSystem`] clone shares the same backing store, mirroring
/// how a real directory is shared by every handle opened against it.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MemFile>>>,
}

impl InMemoryFileSystem {
    /// Creates a fresh, empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystem for InMemoryFileSystem {
    type File = MemFile;

    fn create(&self, path: &Path) -> io::Result<Self::File> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        let mut files = self.files.lock().expect("lock poisoned");
        let file = MemFile(Arc::new(Bytes::default()));
        files.insert(path.to_path_buf(), file.clone());
        Ok(file)
    }

    fn open(&self, path: &Path) -> io::Result<Self::File> {
        #[expect(clippy::expect_used, reason = "lock poisoned")]
        let files = self.files.lock().expect("lock poisoned");
        files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}: not found", path.display()))
        })
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        // Directories are implicit: any path prefix is "creatable".
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        #[expect(clippy::expect_used, reason = "lock poisoned")]
        let files = self.files.lock().expect("lock poisoned");
        Ok(files
            .keys()
            .filter_map(|path| {
                if path.parent() == Some(dir) {
                    path.file_name().map(OsString::from)
                } else {
                    None
                }
            })
            .collect())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        #[expect(clippy::expect_used, reason = "lock poisoned")]
        let mut files = self.files.lock().expect("lock poisoned");
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}: not found", path.display())))
    }

    fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
        #[expect(clippy::expect_used, reason = "lock poisoned")]
        let mut files = self.files.lock().expect("lock poisoned");
        let file = files
            .remove(src)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}: not found", src.display())))?;
        files.insert(dst.to_path_buf(), file);
        Ok(())
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        #[expect(clippy::expect_used, reason = "lock poisoned")]
        let files = self.files.lock().expect("lock poisoned");
        Ok(files.contains_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn create_append_read_at() -> io::Result<()> {
        let fs = InMemoryFileSystem::new();
        let path = Path::new("/db/table.0");

        let file = fs.create(path)?;
        file.append(b"hello ")?;
        file.append(b"world")?;

        let reopened = fs.open(path)?;
        assert_eq!(b"hello world".to_vec(), reopened.read_at(0, 11)?);
        assert_eq!(b"world".to_vec(), reopened.read_at(6, 100)?);
        assert_eq!(Vec::<u8>::new(), reopened.read_at(100, 10)?);

        Ok(())
    }

    #[test]
    fn rename_and_delete() -> io::Result<()> {
        let fs = InMemoryFileSystem::new();
        let a = Path::new("/db/table.0");
        let b = Path::new("/db/table.1");

        fs.create(a)?.append(b"data")?;
        fs.rename(a, b)?;

        assert!(!fs.exists(a)?);
        assert!(fs.exists(b)?);

        fs.delete(b)?;
        assert!(!fs.exists(b)?);

        Ok(())
    }

    #[test]
    fn list_returns_direct_children() -> io::Result<()> {
        let fs = InMemoryFileSystem::new();
        fs.create(Path::new("/db/table.0"))?;
        fs.create(Path::new("/db/table.1"))?;
        fs.create(Path::new("/db/manifest"))?;

        let mut names: Vec<String> = fs
            .list(Path::new("/db"))?
            .into_iter()
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(vec!["manifest", "table.0", "table.1"], names);

        Ok(())
    }
}
