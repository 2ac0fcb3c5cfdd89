// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Append-only file writer with an in-memory staging buffer.
//!
//! This is the only path by which the engine ever writes to a file: table
//! writers stage every entry here and issue at most one real append per
//! `flush`. No alignment or page size is needed — a single final flush
//! before close suffices.

use crate::fs::FileHandle;

/// A buffered, append-only writer around an already-open file handle.
pub struct BufferedWriter<H: FileHandle> {
    file: H,
    buffer: Vec<u8>,
}

impl<H: FileHandle> BufferedWriter<H> {
    /// Wraps `file`, which must already be open, truncated, and positioned
    /// at the start (a freshly created file).
    #[must_use]
    pub fn new(file: H) -> Self {
        Self {
            file,
            buffer: Vec::new(),
        }
    }

    /// Copies `bytes` into the in-memory buffer. Does no I/O.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes the buffer's contents to the file and empties the buffer.
    ///
    /// A no-op on an already-empty buffer.
    pub fn flush(&mut self) -> crate::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.append(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes any remaining bytes, then drops the file handle.
    pub fn close(mut self) -> crate::Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, StdFileSystem};
    use test_log::test;

    #[test]
    fn append_flush_append_close() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test");

        let fs = StdFileSystem;
        let file = fs.create(&path)?;

        let mut writer = BufferedWriter::new(file);
        writer.append(b"hello ");
        writer.append(b"world");
        writer.flush()?;
        writer.append(b"!");
        writer.close()?;

        let readback = fs.open(&path)?;
        let contents = readback.read_at(0, 32)?;
        assert_eq!(b"hello world!".to_vec(), contents);

        Ok(())
    }

    #[test]
    fn flush_on_empty_buffer_is_a_no_op() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test");

        let fs = StdFileSystem;
        let file = fs.create(&path)?;
        let mut writer = BufferedWriter::new(file);

        writer.flush()?;
        writer.flush()?;
        writer.append(b"x");
        writer.close()?;

        let readback = fs.open(&path)?;
        assert_eq!(b"x".to_vec(), readback.read_at(0, 8)?);

        Ok(())
    }
}
