// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Streams entries into a new table file while building its index.

use crate::{
    buffered_writer::BufferedWriter,
    coding::{encode_slice, encode_u64, U64_SIZE},
    fs::FileSystem,
    slice::Slice,
    table::Table,
};
use std::{collections::HashMap, path::PathBuf};

/// Builds a new table by appending entries in any order.
///
/// `close` is the only way to obtain the resulting [`Table`]: the writer
/// itself never serves reads.
pub struct TableWriter<F: FileSystem> {
    path: PathBuf,
    writer: BufferedWriter<F::File>,
    offset: u64,
    index: HashMap<u64, u64>,
}

impl<F: FileSystem> TableWriter<F> {
    /// Creates (truncating) the file at `path` and starts a fresh table.
    pub fn new(fs: &F, path: PathBuf) -> crate::Result<Self> {
        let file = fs.create(&path)?;
        Ok(Self {
            path,
            writer: BufferedWriter::new(file),
            offset: 0,
            index: HashMap::new(),
        })
    }

    /// Appends one entry and records its value offset in the index.
    ///
    /// A later `put` for the same key shadows an earlier one, matching how
    /// [`crate::table::recover`] resolves duplicate keys on a scan.
    pub fn put(&mut self, key: u64, value: &Slice) {
        let mut buf = Vec::with_capacity(2 * U64_SIZE + value.len());
        encode_u64(key, &mut buf);
        encode_slice(value, &mut buf);
        self.writer.append(&buf);

        #[allow(clippy::cast_possible_truncation)]
        let value_offset = self.offset + 2 * U64_SIZE as u64;
        self.index.insert(key, value_offset);

        #[allow(clippy::cast_possible_truncation)]
        let entry_len = (2 * U64_SIZE + value.len()) as u64;
        self.offset += entry_len;
    }

    /// Flushes and closes the write handle, then reopens the file read-only
    /// as a [`Table`].
    ///
    /// The reopen is needed because readers issue positional reads on a
    /// handle distinct from the one this writer appended through.
    pub fn close(self, fs: &F) -> crate::Result<Table<F::File>> {
        self.writer.close()?;
        let file = fs.open(&self.path)?;
        Ok(Table::new(self.path, file, self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;
    use test_log::test;

    #[test]
    fn put_then_close_reads_back_all_values() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = StdFileSystem;

        let mut writer = TableWriter::new(&fs, dir.path().join("table.0"))?;
        writer.put(1, &Slice::new(b"v1"));
        writer.put(10, &Slice::new(b"value ten"));
        writer.put(2, &Slice::new(b"v two"));
        let table = writer.close(&fs)?;

        assert_eq!((Slice::new(b"v1"), true), table.read(1)?);
        assert_eq!((Slice::new(b"v two"), true), table.read(2)?);
        assert_eq!((Slice::new(b"value ten"), true), table.read(10)?);

        Ok(())
    }

    #[test]
    fn large_value_round_trips() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = StdFileSystem;

        let data: Vec<u8> = (0..5000).map(|i| (i % 10) as u8).collect();

        let mut writer = TableWriter::new(&fs, dir.path().join("table.0"))?;
        writer.put(1, &Slice::from(data.clone()));
        let table = writer.close(&fs)?;

        assert_eq!((Slice::from(data), true), table.read(1)?);

        Ok(())
    }

    #[test]
    fn repeated_key_keeps_the_last_value() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = StdFileSystem;

        let mut writer = TableWriter::new(&fs, dir.path().join("table.0"))?;
        writer.put(1, &Slice::new(b"old"));
        writer.put(1, &Slice::new(b"new"));
        let table = writer.close(&fs)?;

        assert_eq!((Slice::new(b"new"), true), table.read(1)?);

        Ok(())
    }
}
