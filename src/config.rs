// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Opening a database: a small builder over which directory and filesystem
//! backend to use.

use crate::{
    db::Database,
    fs::{FileSystem, StdFileSystem},
    manifest::MANIFEST_FILE,
};
use std::path::{Path, PathBuf};

/// Builder for opening or creating a [`Database`].
#[derive(Clone)]
pub struct Config<F: FileSystem = StdFileSystem> {
    path: PathBuf,
    fs: F,
}

impl Config<StdFileSystem> {
    /// Starts a config pointed at `path` on the real filesystem.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fs: StdFileSystem,
        }
    }
}

impl<F: FileSystem> Config<F> {
    /// Uses `fs` instead of the real filesystem, e.g. an
    /// [`InMemoryFileSystem`](crate::memory_fs::InMemoryFileSystem) in tests.
    #[must_use]
    pub fn use_filesystem<F2: FileSystem>(self, fs: F2) -> Config<F2> {
        Config {
            path: self.path,
            fs,
        }
    }

    /// Opens the database at this config's path.
    ///
    /// If a manifest file is already present, the existing database is
    /// recovered; otherwise a new, empty database is created. The
    /// directory must not already contain a database under a different
    /// layout, and a fresh directory must be empty.
    pub fn open(self) -> crate::Result<Database<F>> {
        if self.fs.exists(&self.path.join(MANIFEST_FILE))? {
            Database::recover(self.fs, self.path)
        } else {
            Database::create(self.fs, self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_fs::InMemoryFileSystem;
    use test_log::test;

    #[test]
    fn open_creates_then_recovers() -> crate::Result<()> {
        let fs = InMemoryFileSystem::new();

        let db = Config::new("/db").use_filesystem(fs.clone()).open()?;
        db.write(1, b"v1".as_slice())?;
        db.close()?;

        let db = Config::new("/db").use_filesystem(fs).open()?;
        assert_eq!((crate::slice::Slice::new(b"v1"), true), db.read(1)?);

        Ok(())
    }
}
