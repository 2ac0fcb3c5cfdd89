// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Filesystem abstraction for pluggable storage backends.
//!
//! The core engine never touches `std::fs` directly. Everything goes through
//! [`FileSystem`] and [`FileHandle`], so the whole engine can run against an
//! in-memory backend ([`crate::memory_fs::InMemoryFileSystem`]) in tests
//! without touching disk.
//!
//! There is no explicit `close` in this trait: a handle is closed by
//! dropping it, which is what the spec's `close(fh)` means in a Rust port.

use std::{ffi::OsString, io, path::Path};

/// A single open file, either for positional reads or for appending.
pub trait FileHandle: Send + Sync + std::fmt::Debug {
    /// Appends `bytes` to the end of the file.
    fn append(&self, bytes: &[u8]) -> io::Result<()>;

    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer than `len` bytes only at end-of-file, never errors on a
    /// short read.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    /// Returns the current size of the file in bytes.
    fn size(&self) -> io::Result<u64>;
}

/// Directory-scoped filesystem abstraction.
pub trait FileSystem: Send + Sync {
    /// The file handle type this backend hands out.
    type File: FileHandle;

    /// Creates a file, truncating it if it already exists.
    fn create(&self, path: &Path) -> io::Result<Self::File>;

    /// Opens an existing file read-only.
    fn open(&self, path: &Path) -> io::Result<Self::File>;

    /// Creates a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Lists the file names directly inside `dir`.
    fn list(&self, dir: &Path) -> io::Result<Vec<OsString>>;

    /// Removes a file.
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Renames (moves) a file, overwriting the destination if present.
    ///
    /// Used to install the manifest atomically: callers write to a
    /// temporary path and rename it into place.
    fn rename(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Checks whether a path exists.
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

mod std_backend {
    use super::{FileHandle, FileSystem};
    use std::{
        ffi::OsString,
        fs, io,
        io::{Read, Seek, SeekFrom, Write},
        path::Path,
        sync::Mutex,
    };

    /// `std::fs`-backed file handle.
    ///
    /// Positional reads and appends share a single handle behind a mutex:
    /// this engine has at most one writer and point reads are infrequent
    /// enough relative to disk I/O that the lock is never the bottleneck.
    #[derive(Debug)]
    pub struct StdFile(Mutex<fs::File>);

    impl FileHandle for StdFile {
        fn append(&self, bytes: &[u8]) -> io::Result<()> {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let mut file = self.0.lock().expect("lock poisoned");
            file.seek(SeekFrom::End(0))?;
            file.write_all(bytes)
        }

        fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let mut file = self.0.lock().expect("lock poisoned");
            file.seek(SeekFrom::Start(offset))?;

            let mut buf = vec![0; len];
            let mut read = 0;

            // read() may return short reads that are not EOF; loop until we
            // either fill the buffer or hit a genuine EOF (n == 0).
            while read < len {
                #[expect(clippy::indexing_slicing, reason = "read < len is the loop invariant")]
                let n = file.read(&mut buf[read..])?;
                if n == 0 {
                    break;
                }
                read += n;
            }

            buf.truncate(read);
            Ok(buf)
        }

        fn size(&self) -> io::Result<u64> {
            #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
            let file = self.0.lock().expect("lock poisoned");
            Ok(file.metadata()?.len())
        }
    }

    /// `std::fs`-backed [`FileSystem`] implementation.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct StdFileSystem;

    impl FileSystem for StdFileSystem {
        type File = StdFile;

        fn create(&self, path: &Path) -> io::Result<Self::File> {
            Ok(StdFile(Mutex::new(fs::File::create(path)?)))
        }

        fn open(&self, path: &Path) -> io::Result<Self::File> {
            Ok(StdFile(Mutex::new(fs::File::open(path)?)))
        }

        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            fs::create_dir_all(path)
        }

        fn list(&self, dir: &Path) -> io::Result<Vec<OsString>> {
            fs::read_dir(dir)?
                .map(|entry| entry.map(|entry| entry.file_name()))
                .collect()
        }

        fn delete(&self, path: &Path) -> io::Result<()> {
            fs::remove_file(path)
        }

        fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
            fs::rename(src, dst)
        }

        fn exists(&self, path: &Path) -> io::Result<bool> {
            path.try_exists()
        }
    }
}

pub use std_backend::{StdFile, StdFileSystem};
